/// Asset Ledger
///
/// Fungible-asset bookkeeping for collateral, conditional tokens and LP shares:
/// - AssetLedger: the transfer / mint / burn / balanceOf interface the vault
///   and pool logic is written against
/// - Ledger: in-memory implementation with all-or-nothing batch commits
///
/// Custody is just ownership: a vault's collateral is the balance owned by
/// the vault's own address, and moving it out needs the vault as authority.
/// The ledger takes `authority` at face value; only the engine signs as a
/// vault or pool, and hosts reach the ledger through `engine::HostLedger`.

use crate::errors::{MarketError, Result};
use crate::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Registered fungible asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: Address,
    pub decimals: u8,
    /// Only this principal may mint. None = fixed supply
    pub mint_authority: Option<Address>,
    /// Outstanding units
    pub supply: u64,
    #[serde(default)]
    pub metadata: Option<TokenMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// One primitive balance movement. `authority` is the principal signing for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetOp {
    Transfer { asset: Address, from: Address, to: Address, amount: u64, authority: Address },
    Mint { asset: Address, to: Address, amount: u64, authority: Address },
    Burn { asset: Address, from: Address, amount: u64, authority: Address },
}

/// Ledger operations an entity wants committed, plus what it reports back
/// once they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged<R> {
    pub ops: Vec<AssetOp>,
    pub receipt: R,
}

// ============================================================================
// LEDGER INTERFACE
// ============================================================================

pub trait AssetLedger {
    fn asset(&self, asset: &Address) -> Option<&AssetInfo>;

    fn balance_of(&self, asset: &Address, owner: &Address) -> u64;

    /// Register a new asset with zero supply
    fn create_asset(&mut self, id: Address, decimals: u8, mint_authority: Option<Address>) -> Result<()>;

    fn set_metadata(&mut self, asset: &Address, authority: &Address, metadata: TokenMetadata) -> Result<()>;

    /// Apply every op or none of them.
    fn commit(&mut self, ops: &[AssetOp]) -> Result<()>;

    fn supply_of(&self, asset: &Address) -> Option<u64> {
        self.asset(asset).map(|info| info.supply)
    }

    fn transfer(&mut self, asset: &Address, from: &Address, to: &Address, amount: u64) -> Result<()> {
        self.commit(&[AssetOp::Transfer { asset: *asset, from: *from, to: *to, amount, authority: *from }])
    }

    fn mint(&mut self, asset: &Address, to: &Address, amount: u64, authority: &Address) -> Result<()> {
        self.commit(&[AssetOp::Mint { asset: *asset, to: *to, amount, authority: *authority }])
    }

    fn burn(&mut self, asset: &Address, from: &Address, amount: u64) -> Result<()> {
        self.commit(&[AssetOp::Burn { asset: *asset, from: *from, amount, authority: *from }])
    }
}

// ============================================================================
// IN-MEMORY LEDGER
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Asset id -> asset info
    assets: HashMap<Address, AssetInfo>,
    /// Asset id -> owner -> balance
    balances: HashMap<Address, HashMap<Address, u64>>,
}

/// Balances and supplies touched by a batch, before they are written back
#[derive(Default)]
struct Pending {
    balances: HashMap<(Address, Address), u64>,
    supplies: HashMap<Address, u64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetInfo> {
        self.assets.values()
    }

    /// Non-zero holders of an asset
    pub fn holders(&self, asset: &Address) -> Vec<(Address, u64)> {
        let mut holders: Vec<(Address, u64)> = self
            .balances
            .get(asset)
            .map(|owners| owners.iter().map(|(owner, amount)| (*owner, *amount)).collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    fn require_asset(&self, asset: &Address) -> Result<&AssetInfo> {
        self.assets.get(asset).ok_or_else(|| MarketError::UnknownAsset(asset.to_hex()))
    }

    fn pending_balance(&self, pending: &Pending, asset: &Address, owner: &Address) -> u64 {
        pending
            .balances
            .get(&(*asset, *owner))
            .copied()
            .unwrap_or_else(|| self.balance_of(asset, owner))
    }

    fn pending_supply(&self, pending: &Pending, info: &AssetInfo) -> u64 {
        pending.supplies.get(&info.id).copied().unwrap_or(info.supply)
    }

    fn debit(&self, pending: &mut Pending, asset: &Address, owner: &Address, amount: u64) -> Result<()> {
        let available = self.pending_balance(pending, asset, owner);
        if available < amount {
            return Err(MarketError::InsufficientBalance { available, requested: amount });
        }
        pending.balances.insert((*asset, *owner), available - amount);
        Ok(())
    }

    fn credit(&self, pending: &mut Pending, asset: &Address, owner: &Address, amount: u64) -> Result<()> {
        let current = self.pending_balance(pending, asset, owner);
        let next = current.checked_add(amount).ok_or(MarketError::MathOverflow)?;
        pending.balances.insert((*asset, *owner), next);
        Ok(())
    }

    fn stage(&self, pending: &mut Pending, op: &AssetOp) -> Result<()> {
        match op {
            AssetOp::Transfer { asset, from, to, amount, authority } => {
                self.require_asset(asset)?;
                if authority != from {
                    return Err(MarketError::Unauthorized(format!(
                        "{} cannot move funds owned by {}",
                        authority.short(),
                        from.short()
                    )));
                }
                self.debit(pending, asset, from, *amount)?;
                self.credit(pending, asset, to, *amount)
            }
            AssetOp::Mint { asset, to, amount, authority } => {
                let info = self.require_asset(asset)?;
                if info.mint_authority != Some(*authority) {
                    return Err(MarketError::Unauthorized(format!(
                        "{} is not the mint authority of {}",
                        authority.short(),
                        asset.short()
                    )));
                }
                let supply = self
                    .pending_supply(pending, info)
                    .checked_add(*amount)
                    .ok_or(MarketError::MathOverflow)?;
                pending.supplies.insert(*asset, supply);
                self.credit(pending, asset, to, *amount)
            }
            AssetOp::Burn { asset, from, amount, authority } => {
                let info = self.require_asset(asset)?;
                if authority != from {
                    return Err(MarketError::Unauthorized(format!(
                        "{} cannot burn tokens owned by {}",
                        authority.short(),
                        from.short()
                    )));
                }
                let supply = self
                    .pending_supply(pending, info)
                    .checked_sub(*amount)
                    .ok_or_else(|| MarketError::InvariantViolated(format!("burn exceeds supply of {}", asset)))?;
                self.debit(pending, asset, from, *amount)?;
                pending.supplies.insert(*asset, supply);
                Ok(())
            }
        }
    }
}

impl AssetLedger for Ledger {
    fn asset(&self, asset: &Address) -> Option<&AssetInfo> {
        self.assets.get(asset)
    }

    fn balance_of(&self, asset: &Address, owner: &Address) -> u64 {
        self.balances
            .get(asset)
            .and_then(|owners| owners.get(owner))
            .copied()
            .unwrap_or(0)
    }

    fn create_asset(&mut self, id: Address, decimals: u8, mint_authority: Option<Address>) -> Result<()> {
        if self.assets.contains_key(&id) {
            return Err(MarketError::AlreadyExists(format!("asset {}", id)));
        }
        self.assets.insert(
            id,
            AssetInfo { id, decimals, mint_authority, supply: 0, metadata: None },
        );
        tracing::debug!(asset = %id.short(), decimals, "asset registered");
        Ok(())
    }

    fn set_metadata(&mut self, asset: &Address, authority: &Address, metadata: TokenMetadata) -> Result<()> {
        let info = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| MarketError::UnknownAsset(asset.to_hex()))?;
        if info.mint_authority != Some(*authority) {
            return Err(MarketError::Unauthorized(format!(
                "{} cannot set metadata on {}",
                authority.short(),
                asset.short()
            )));
        }
        info.metadata = Some(metadata);
        Ok(())
    }

    fn commit(&mut self, ops: &[AssetOp]) -> Result<()> {
        let mut pending = Pending::default();
        for op in ops {
            self.stage(&mut pending, op)?;
        }

        for ((asset, owner), amount) in pending.balances {
            let owners = self.balances.entry(asset).or_default();
            if amount == 0 {
                owners.remove(&owner);
            } else {
                owners.insert(owner, amount);
            }
        }
        for (asset, supply) in pending.supplies {
            if let Some(info) = self.assets.get_mut(&asset) {
                info.supply = supply;
            }
        }

        tracing::debug!(ops = ops.len(), "ledger batch committed");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Ledger, Address, Address, Address) {
        let mut ledger = Ledger::new();
        let issuer = Address::from_label("issuer");
        let usdc = Address::from_label("usdc");
        let alice = Address::from_label("alice");
        ledger.create_asset(usdc, 6, Some(issuer)).unwrap();
        ledger.mint(&usdc, &alice, 1_000, &issuer).unwrap();
        (ledger, issuer, usdc, alice)
    }

    #[test]
    fn test_mint_requires_authority() {
        let (mut ledger, _issuer, usdc, alice) = setup();
        assert_eq!(ledger.balance_of(&usdc, &alice), 1_000);
        assert_eq!(ledger.supply_of(&usdc), Some(1_000));

        let result = ledger.mint(&usdc, &alice, 5, &alice);
        assert!(matches!(result, Err(MarketError::Unauthorized(_))));
        assert_eq!(ledger.supply_of(&usdc), Some(1_000));
    }

    #[test]
    fn test_transfer_and_insufficient_balance() {
        let (mut ledger, _issuer, usdc, alice) = setup();
        let bob = Address::from_label("bob");

        ledger.transfer(&usdc, &alice, &bob, 400).unwrap();
        assert_eq!(ledger.balance_of(&usdc, &alice), 600);
        assert_eq!(ledger.balance_of(&usdc, &bob), 400);

        let result = ledger.transfer(&usdc, &bob, &alice, 401);
        assert_eq!(result, Err(MarketError::InsufficientBalance { available: 400, requested: 401 }));
    }

    #[test]
    fn test_transfer_needs_owner_authority() {
        let (mut ledger, _issuer, usdc, alice) = setup();
        let bob = Address::from_label("bob");

        let result = ledger.commit(&[AssetOp::Transfer {
            asset: usdc,
            from: alice,
            to: bob,
            amount: 1,
            authority: bob,
        }]);
        assert!(matches!(result, Err(MarketError::Unauthorized(_))));
    }

    #[test]
    fn test_failed_batch_changes_nothing() {
        let (mut ledger, issuer, usdc, alice) = setup();
        let bob = Address::from_label("bob");

        // First op is fine on its own, second overdraws
        let result = ledger.commit(&[
            AssetOp::Mint { asset: usdc, to: bob, amount: 50, authority: issuer },
            AssetOp::Transfer { asset: usdc, from: alice, to: bob, amount: 5_000, authority: alice },
        ]);
        assert!(result.is_err());
        assert_eq!(ledger.balance_of(&usdc, &bob), 0);
        assert_eq!(ledger.balance_of(&usdc, &alice), 1_000);
        assert_eq!(ledger.supply_of(&usdc), Some(1_000));
    }

    #[test]
    fn test_batch_sees_its_own_earlier_ops() {
        let (mut ledger, issuer, usdc, alice) = setup();
        let bob = Address::from_label("bob");

        // Bob can spend what the same batch just minted to him
        ledger
            .commit(&[
                AssetOp::Mint { asset: usdc, to: bob, amount: 10, authority: issuer },
                AssetOp::Transfer { asset: usdc, from: bob, to: alice, amount: 10, authority: bob },
            ])
            .unwrap();
        assert_eq!(ledger.balance_of(&usdc, &bob), 0);
        assert_eq!(ledger.balance_of(&usdc, &alice), 1_010);
    }

    #[test]
    fn test_burn_reduces_supply() {
        let (mut ledger, _issuer, usdc, alice) = setup();
        ledger.burn(&usdc, &alice, 250).unwrap();
        assert_eq!(ledger.balance_of(&usdc, &alice), 750);
        assert_eq!(ledger.supply_of(&usdc), Some(750));
        assert!(ledger.burn(&usdc, &alice, 751).is_err());
    }

    #[test]
    fn test_duplicate_asset_and_unknown_asset() {
        let (mut ledger, issuer, usdc, alice) = setup();
        assert!(matches!(ledger.create_asset(usdc, 6, Some(issuer)), Err(MarketError::AlreadyExists(_))));

        let ghost = Address::from_label("ghost");
        assert!(matches!(ledger.transfer(&ghost, &alice, &issuer, 1), Err(MarketError::UnknownAsset(_))));
    }

    #[test]
    fn test_metadata_requires_mint_authority() {
        let (mut ledger, issuer, usdc, alice) = setup();
        let metadata = TokenMetadata { name: "USD Coin".into(), symbol: "USDC".into(), uri: None };

        assert!(ledger.set_metadata(&usdc, &alice, metadata.clone()).is_err());
        ledger.set_metadata(&usdc, &issuer, metadata.clone()).unwrap();
        assert_eq!(ledger.asset(&usdc).unwrap().metadata, Some(metadata));
    }

    #[test]
    fn test_holders_skip_zero_balances() {
        let (mut ledger, _issuer, usdc, alice) = setup();
        let bob = Address::from_label("bob");
        ledger.transfer(&usdc, &alice, &bob, 1_000).unwrap();
        assert_eq!(ledger.holders(&usdc), vec![(bob, 1_000)]);
    }
}
