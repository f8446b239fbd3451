/// Event journal
///
/// Every successful state change appends one event. The journal keeps the
/// most recent `capacity` entries and drops the oldest beyond that.

use crate::amm::SwapDirection;
use crate::identity::Address;
use crate::vault::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    VaultInitialized { collateral_asset: Address, settlement_authority: Address },
    ConditionalMint { amount: u64, side_hint: Option<Side> },
    ConditionalMerge { amount: u64 },
    VaultResolved { outcome: bool },
    VaultCancelled,
    ConditionalRedeem { on_finalize_burned: u64, on_revert_burned: u64, payout: u64 },
    ConditionalMetadataSet { on_finalize_symbol: String, on_revert_symbol: String },
    ResidualSwept { amount: u64 },
    PoolCreated { base_asset: Address, quote_asset: Address },
    LiquidityAdded { base_amount: u64, quote_amount: u64, lp_minted: u64 },
    LiquidityRemoved { lp_burned: u64, base_amount: u64, quote_amount: u64 },
    Swap { direction: SwapDirection, input_amount: u64, output_amount: u64 },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::VaultInitialized { .. } => "vault_initialized",
            EventKind::ConditionalMint { .. } => "conditional_mint",
            EventKind::ConditionalMerge { .. } => "conditional_merge",
            EventKind::VaultResolved { .. } => "vault_resolved",
            EventKind::VaultCancelled => "vault_cancelled",
            EventKind::ConditionalRedeem { .. } => "conditional_redeem",
            EventKind::ConditionalMetadataSet { .. } => "conditional_metadata_set",
            EventKind::ResidualSwept { .. } => "residual_swept",
            EventKind::PoolCreated { .. } => "pool_created",
            EventKind::LiquidityAdded { .. } => "liquidity_added",
            EventKind::LiquidityRemoved { .. } => "liquidity_removed",
            EventKind::Swap { .. } => "swap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub slot: u64,
    /// Principal that triggered the change
    pub actor: Address,
    /// Vault or pool the change applies to
    pub entity: Address,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventJournal {
    capacity: usize,
    events: VecDeque<EngineEvent>,
}

impl EventJournal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, events: VecDeque::with_capacity(capacity.min(1024)) }
    }

    pub fn record(&mut self, slot: u64, actor: Address, entity: Address, kind: EventKind) -> &EngineEvent {
        let event = EngineEvent {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            timestamp: Utc::now(),
            slot,
            actor,
            entity,
            kind,
        };
        tracing::debug!(id = %event.id, kind = event.kind.label(), entity = %entity.short(), "event recorded");

        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        // just pushed
        &self.events[self.events.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &EngineEvent> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&EngineEvent> {
        self.events.back()
    }

    pub fn for_entity(&self, entity: &Address) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.entity == *entity).collect()
    }

    pub fn by_actor(&self, actor: &Address) -> Vec<&EngineEvent> {
        self.events.iter().filter(|e| e.actor == *actor).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_drops_oldest() {
        let mut journal = EventJournal::new(2);
        let actor = Address::from_label("alice");
        let vault = Address::from_label("vault");

        journal.record(1, actor, vault, EventKind::ConditionalMint { amount: 1, side_hint: None });
        journal.record(2, actor, vault, EventKind::ConditionalMint { amount: 2, side_hint: None });
        journal.record(3, actor, vault, EventKind::VaultCancelled);

        assert_eq!(journal.len(), 2);
        let slots: Vec<u64> = journal.iter().map(|e| e.slot).collect();
        assert_eq!(slots, vec![2, 3]);
        assert_eq!(journal.latest().unwrap().kind, EventKind::VaultCancelled);
    }

    #[test]
    fn test_queries_and_ids() {
        let mut journal = EventJournal::new(10);
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let pool = Address::from_label("pool");
        let vault = Address::from_label("vault");

        let id = journal.record(1, alice, pool, EventKind::PoolCreated { base_asset: bob, quote_asset: alice }).id.clone();
        journal.record(2, bob, vault, EventKind::VaultResolved { outcome: true });

        assert!(id.starts_with("evt_"));
        assert_eq!(journal.for_entity(&pool).len(), 1);
        assert_eq!(journal.by_actor(&bob)[0].entity, vault);
    }

    #[test]
    fn test_event_kind_json_tag() {
        let json = serde_json::to_value(EventKind::ConditionalMerge { amount: 5 }).unwrap();
        assert_eq!(json["type"], "conditional_merge");
        assert_eq!(json["amount"], 5);
    }
}
