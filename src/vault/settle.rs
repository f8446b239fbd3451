// ============================================================================
// Vault Settlement
// ============================================================================
//
// Only the settlement authority can move a vault out of Active, and only
// once. It may also label the two conditional mints while the vault is open.
//
// ============================================================================

use super::{ConditionalVault, VaultStatus};
use crate::errors::{MarketError, Result};
use crate::identity::Address;
use crate::ledger::{AssetLedger, TokenMetadata};
use serde::{Deserialize, Serialize};

/// Labels for both conditional kinds of a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalTokenMetadata {
    pub on_finalize: TokenMetadata,
    pub on_revert: TokenMetadata,
}

impl ConditionalVault {
    /// Finalize with an outcome. `true` means the on-finalize kind pays.
    pub fn resolve(&mut self, caller: &Address, outcome: bool, now: u64) -> Result<()> {
        self.require_authority(caller)?;
        self.require_active("resolve")?;
        self.status = VaultStatus::Finalized { outcome };
        self.resolved_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, caller: &Address, now: u64) -> Result<()> {
        self.require_authority(caller)?;
        self.require_active("cancel")?;
        self.status = VaultStatus::Reverted;
        self.cancelled_at = Some(now);
        Ok(())
    }

    /// Check a metadata request and pair each label with its mint. Labels can
    /// be set once.
    pub fn stage_metadata(
        &self,
        ledger: &impl AssetLedger,
        caller: &Address,
        metadata: ConditionalTokenMetadata,
    ) -> Result<Vec<(Address, TokenMetadata)>> {
        self.require_authority(caller)?;
        self.require_active("set metadata")?;

        for mint in [self.on_finalize_mint, self.on_revert_mint] {
            let info = ledger.asset(&mint).ok_or_else(|| MarketError::UnknownAsset(mint.to_hex()))?;
            if info.metadata.is_some() {
                return Err(MarketError::AlreadyExists(format!("metadata for {}", mint.short())));
            }
        }

        Ok(vec![
            (self.on_finalize_mint, metadata.on_finalize),
            (self.on_revert_mint, metadata.on_revert),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;

    fn vault() -> (ConditionalVault, Address) {
        let authority = Address::from_label("oracle");
        (ConditionalVault::new(authority, Address::from_label("usdc"), "claim", 6, 0), authority)
    }

    #[test]
    fn test_resolve_once() {
        let (mut vault, authority) = vault();
        vault.resolve(&authority, false, 10).unwrap();
        assert_eq!(vault.status, VaultStatus::Finalized { outcome: false });
        assert_eq!(vault.resolved_at, Some(10));

        assert!(matches!(vault.resolve(&authority, true, 11), Err(MarketError::InvalidState(_))));
        assert!(matches!(vault.cancel(&authority, 11), Err(MarketError::InvalidState(_))));
        assert_eq!(vault.status, VaultStatus::Finalized { outcome: false });
    }

    #[test]
    fn test_only_authority_settles() {
        let (mut vault, _authority) = vault();
        let mallory = Address::from_label("mallory");
        assert!(matches!(vault.resolve(&mallory, true, 1), Err(MarketError::Unauthorized(_))));
        assert!(matches!(vault.cancel(&mallory, 1), Err(MarketError::Unauthorized(_))));
        assert!(vault.is_active());
    }

    #[test]
    fn test_cancel_sets_reverted() {
        let (mut vault, authority) = vault();
        vault.cancel(&authority, 5).unwrap();
        assert_eq!(vault.status, VaultStatus::Reverted);
        assert_eq!(vault.cancelled_at, Some(5));
        assert_eq!(vault.resolved_at, None);
    }

    #[test]
    fn test_stage_metadata() {
        let (vault, authority) = vault();
        let mut ledger = Ledger::new();
        ledger.create_asset(vault.on_finalize_mint, 6, Some(vault.id)).unwrap();
        ledger.create_asset(vault.on_revert_mint, 6, Some(vault.id)).unwrap();

        let labels = ConditionalTokenMetadata {
            on_finalize: TokenMetadata { name: "Rain YES".into(), symbol: "pRAIN".into(), uri: None },
            on_revert: TokenMetadata { name: "Rain NO".into(), symbol: "fRAIN".into(), uri: None },
        };

        assert!(vault.stage_metadata(&ledger, &Address::from_label("x"), labels.clone()).is_err());

        let staged = vault.stage_metadata(&ledger, &authority, labels.clone()).unwrap();
        assert_eq!(staged[0].0, vault.on_finalize_mint);
        for (mint, metadata) in staged {
            ledger.set_metadata(&mint, &vault.id, metadata).unwrap();
        }

        assert!(matches!(
            vault.stage_metadata(&ledger, &authority, labels),
            Err(MarketError::AlreadyExists(_))
        ));
    }
}
