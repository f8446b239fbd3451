// ============================================================================
// Engine Snapshots
// ============================================================================
//
// The whole engine state (ledger, vaults, pools, last slot) as pretty JSON on
// disk. The event journal is not persisted; it restarts empty.
//
// ============================================================================

use crate::amm::Pool;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::errors::{MarketError, Result};
use crate::ledger::Ledger;
use crate::vault::ConditionalVault;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub saved_at: DateTime<Utc>,
    pub last_slot: u64,
    pub ledger: Ledger,
    pub vaults: Vec<ConditionalVault>,
    pub pools: Vec<Pool>,
}

impl EngineSnapshot {
    pub fn save_to_disk(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), vaults = self.vaults.len(), pools = self.pools.len(), "state saved");
        Ok(())
    }

    /// `Ok(None)` when there is no file at `path`.
    pub fn load_from_disk(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&json)?;
        tracing::info!(path = %path.display(), vaults = snapshot.vaults.len(), pools = snapshot.pools.len(), "state loaded");
        Ok(Some(snapshot))
    }
}

impl Engine<Ledger> {
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut vaults: Vec<ConditionalVault> = self.vaults.values().cloned().collect();
        vaults.sort_by_key(|v| v.id);
        let mut pools: Vec<Pool> = self.pools.values().cloned().collect();
        pools.sort_by_key(|p| p.id);

        EngineSnapshot {
            saved_at: Utc::now(),
            last_slot: self.last_slot,
            ledger: self.ledger.clone(),
            vaults,
            pools,
        }
    }

    pub fn from_snapshot(snapshot: EngineSnapshot, clock: Box<dyn Clock>, journal_capacity: usize) -> Result<Self> {
        let mut engine = Engine::with_ledger(snapshot.ledger, clock, journal_capacity);
        engine.last_slot = engine.last_slot.max(snapshot.last_slot);

        for vault in snapshot.vaults {
            if engine.vaults.insert(vault.id, vault).is_some() {
                return Err(MarketError::Persistence("duplicate vault in snapshot".into()));
            }
        }
        for pool in snapshot.pools {
            if engine.pools.insert(pool.id, pool).is_some() {
                return Err(MarketError::Persistence("duplicate pool in snapshot".into()));
            }
        }
        Ok(engine)
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        self.snapshot().save_to_disk(&config.state_path)
    }

    /// Restore from `config.state_path`, or start empty if nothing is saved.
    pub fn load_or_new(config: &EngineConfig, clock: Box<dyn Clock>) -> Result<Self> {
        match EngineSnapshot::load_from_disk(&config.state_path)? {
            Some(snapshot) => Self::from_snapshot(snapshot, clock, config.journal_capacity),
            None => {
                tracing::info!(path = %config.state_path.display(), "no saved state, starting fresh");
                Ok(Self::new(config, clock))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::identity::Address;
    use crate::ledger::AssetLedger;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("binary_market_core_{}", uuid::Uuid::new_v4().simple()))
            .join(name)
    }

    fn populated_engine(clock: &ManualClock) -> (Engine, Address) {
        let mut engine = Engine::new(&EngineConfig::default(), Box::new(clock.clone()));
        let issuer = Address::from_label("issuer");
        let usdc = Address::from_label("usdc");
        let alice = Address::from_label("alice");
        engine.create_asset(usdc, 6, Some(issuer)).unwrap();
        engine.host_ledger().mint(&usdc, &alice, 500, &issuer).unwrap();

        let vault = engine.initialize_vault(Address::from_label("oracle"), usdc, "claim").unwrap();
        engine.mint_conditional_tokens(&vault, &alice, 200, None).unwrap();
        (engine, vault)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let clock = ManualClock::new(77);
        let (engine, vault_id) = populated_engine(&clock);
        let config = EngineConfig { state_path: temp_path("state.json"), ..EngineConfig::default() };

        engine.save(&config).unwrap();
        let restored = Engine::load_or_new(&config, Box::new(ManualClock::new(0))).unwrap();

        assert_eq!(restored.vault(&vault_id), engine.vault(&vault_id));
        assert_eq!(restored.last_slot(), 77);
        let alice = Address::from_label("alice");
        let usdc = Address::from_label("usdc");
        assert_eq!(restored.balance_of(&usdc, &alice), 300);
        assert!(restored.journal().is_empty());
        restored.audit_vault(&vault_id).unwrap();

        let _ = fs::remove_dir_all(config.state_path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let config = EngineConfig { state_path: temp_path("absent.json"), ..EngineConfig::default() };
        let engine = Engine::load_or_new(&config, Box::new(ManualClock::new(5))).unwrap();
        assert_eq!(engine.vaults().count(), 0);
        assert_eq!(engine.ledger().assets().count(), 0);
    }

    #[test]
    fn test_corrupt_file_is_a_persistence_error() {
        let path = temp_path("bad.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let result = EngineSnapshot::load_from_disk(&path);
        assert!(matches!(result, Err(MarketError::Persistence(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
