/// Slot clock used by the TWAP oracle and vault timestamps.
///
/// A slot is any monotonic counter (block height or unix seconds). The engine
/// never lets its observed slot move backwards, whatever a clock reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Unix seconds from the wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Hand-driven clock. Clones share the same counter, so a test can keep one
/// handle and give another to the engine.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    slot: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self { slot: Arc::new(AtomicU64::new(start)) }
    }

    pub fn set(&self, slot: u64) {
        self.slot.store(slot, Ordering::SeqCst);
    }

    pub fn advance(&self, slots: u64) -> u64 {
        self.slot.fetch_add(slots, Ordering::SeqCst) + slots
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.slot.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_handle() {
        let clock = ManualClock::new(100);
        let handle = clock.clone();

        assert_eq!(handle.advance(5), 105);
        assert_eq!(clock.now(), 105);

        clock.set(200);
        assert_eq!(handle.now(), 200);
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
