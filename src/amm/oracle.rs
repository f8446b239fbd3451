/// TWAP oracle embedded in every pool.
///
/// A plain TWAP over raw prices can be dragged around by a few large swaps,
/// so the aggregator integrates *observations* instead. An observation chases
/// the pool price but can move at most `max_observation_change_per_update`
/// per update.
///
/// Prices are quote-per-base scaled by 1e12. The UI price is
/// `price * 10^(base_decimals - quote_decimals) / 1e12`; see
/// `math::amm_price_to_ui_price`.

use crate::errors::{MarketError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapOracle {
    pub last_updated_slot: u64,
    pub created_at_slot: u64,
    /// Raw pool price at the last update, before clamping
    pub last_price: u128,
    pub last_observation: u128,
    /// Running sum of observation * slots elapsed. Wraps on overflow, so
    /// consumers should take the difference of two readings.
    pub aggregator: u128,
    pub max_observation_change_per_update: u128,
    pub initial_observation: u128,
}

impl TwapOracle {
    pub fn new(now: u64, initial_observation: u128, max_observation_change_per_update: u128) -> Self {
        Self {
            last_updated_slot: now,
            created_at_slot: now,
            last_price: 0,
            last_observation: initial_observation,
            aggregator: 0,
            max_observation_change_per_update,
            initial_observation,
        }
    }

    /// Fold in a new pool price observed at `now`.
    pub fn update(&mut self, raw_price: u128, now: u64) {
        let elapsed = now.saturating_sub(self.last_updated_slot);
        if elapsed > 0 {
            self.aggregator = self
                .aggregator
                .wrapping_add(self.last_observation.wrapping_mul(elapsed as u128));
        }

        let lower = self.last_observation.saturating_sub(self.max_observation_change_per_update);
        let upper = self.last_observation.saturating_add(self.max_observation_change_per_update);

        self.last_observation = raw_price.clamp(lower, upper);
        self.last_price = raw_price;
        self.last_updated_slot = self.last_updated_slot.max(now);
    }

    /// Time-weighted average observation from creation until `now`, with the
    /// current observation carried forward over the slots since the last update.
    pub fn twap(&self, now: u64) -> Result<u128> {
        let since_created = now.saturating_sub(self.created_at_slot);
        if since_created == 0 {
            return Err(MarketError::DivideByZero);
        }

        let pending = now.saturating_sub(self.last_updated_slot) as u128;
        let total = self
            .aggregator
            .wrapping_add(self.last_observation.wrapping_mul(pending));
        Ok(total / since_created as u128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE_500: u128 = 500_000_000_000;

    #[test]
    fn test_observation_is_clamped() {
        let mut oracle = TwapOracle::new(0, PRICE_500, 10_000_000_000);

        // Price doubles; observation moves by the cap only
        oracle.update(2 * PRICE_500, 10);
        assert_eq!(oracle.last_price, 2 * PRICE_500);
        assert_eq!(oracle.last_observation, PRICE_500 + 10_000_000_000);

        // Crash to zero; observation steps down by the cap
        oracle.update(0, 20);
        assert_eq!(oracle.last_observation, PRICE_500);
    }

    #[test]
    fn test_aggregator_accumulates_previous_observation() {
        let mut oracle = TwapOracle::new(100, 1_000, 1_000);
        oracle.update(1_500, 110);
        assert_eq!(oracle.aggregator, 1_000 * 10);
        oracle.update(1_500, 120);
        assert_eq!(oracle.aggregator, 1_000 * 10 + 1_500 * 10);

        // Same slot again: nothing accrues
        oracle.update(1_500, 120);
        assert_eq!(oracle.aggregator, 25_000);
    }

    #[test]
    fn test_slot_never_moves_backwards() {
        let mut oracle = TwapOracle::new(50, 1_000, 100);
        oracle.update(1_050, 40);
        assert_eq!(oracle.last_updated_slot, 50);
        assert_eq!(oracle.aggregator, 0);
    }

    #[test]
    fn test_saturating_clamp_near_zero() {
        let mut oracle = TwapOracle::new(0, 5, 100);
        oracle.update(0, 1);
        assert_eq!(oracle.last_observation, 0);
    }

    #[test]
    fn test_twap() {
        let mut oracle = TwapOracle::new(0, 1_000, 1_000);
        assert_eq!(oracle.twap(0), Err(MarketError::DivideByZero));

        oracle.update(2_000, 10);
        // aggregator 10_000 over 10 slots
        assert_eq!(oracle.twap(10).unwrap(), 1_000);
        // another 10 slots at 2_000 carried forward
        assert_eq!(oracle.twap(20).unwrap(), 1_500);
    }
}
