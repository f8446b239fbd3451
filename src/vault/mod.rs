// ============================================================================
// Conditional Vault - Binary Market Core
// ============================================================================
//
// A vault escrows one collateral asset against a claim and issues two
// conditional token kinds for it:
//
//   1 collateral → 1 on-finalize token + 1 on-revert token
//
// The settlement authority later either finalizes the vault with an outcome
// or reverts it. After that, holders redeem their conditional tokens for
// collateral through the vault.
//
// Lifecycle:
//   Active ──resolve──→ Finalized(outcome)
//      └────cancel────→ Reverted
//
// Both end states are terminal.
//
// Every operation here works on the vault value alone and returns the ledger
// ops it needs as a Staged batch. The engine commits the batch and only then
// keeps the mutated vault.
//
// ============================================================================

pub mod mint;
pub mod redeem;
pub mod settle;

pub use mint::{MergeReceipt, MintReceipt};
pub use redeem::{RedeemReceipt, SweepReceipt};
pub use settle::ConditionalTokenMetadata;

use crate::errors::{MarketError, Result};
use crate::identity::{on_finalize_mint_address, on_revert_mint_address, vault_address, Address, Fingerprint};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum VaultStatus {
    /// Accepting deposits, awaiting a decision
    Active,
    /// Settled. `outcome == true` pays on-finalize holders, `false` pays on-revert holders
    Finalized { outcome: bool },
    /// Claim never adjudicated; complete sets are refunded
    Reverted,
}

impl VaultStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VaultStatus::Active)
    }
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultStatus::Active => write!(f, "active"),
            VaultStatus::Finalized { outcome } => write!(f, "finalized({})", outcome),
            VaultStatus::Reverted => write!(f, "reverted"),
        }
    }
}

/// Which conditional kind a minter is after. Quantities are always symmetric;
/// the hint only ends up in the event journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    OnFinalize,
    OnRevert,
}

// ============================================================================
// VAULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalVault {
    pub id: Address,
    pub settlement_authority: Address,
    pub collateral_asset: Address,
    pub claim_fingerprint: Fingerprint,
    pub status: VaultStatus,
    /// Collateral in custody: deposits minus payouts
    pub collateral_held: u64,
    pub on_finalize_mint: Address,
    pub on_revert_mint: Address,
    /// Inherited from the collateral asset
    pub decimals: u8,
    pub total_on_finalize_minted: u64,
    pub total_on_revert_minted: u64,
    pub created_at: u64,
    pub resolved_at: Option<u64>,
    pub cancelled_at: Option<u64>,
}

impl ConditionalVault {
    /// Build a fresh Active vault. The id and both mint ids follow from the
    /// (authority, collateral, claim) triple.
    pub fn new(
        settlement_authority: Address,
        collateral_asset: Address,
        claim_content_id: &str,
        decimals: u8,
        now: u64,
    ) -> Self {
        let claim_fingerprint = Fingerprint::of_content_id(claim_content_id);
        let id = vault_address(&settlement_authority, &collateral_asset, &claim_fingerprint);

        Self {
            id,
            settlement_authority,
            collateral_asset,
            claim_fingerprint,
            status: VaultStatus::Active,
            collateral_held: 0,
            on_finalize_mint: on_finalize_mint_address(&id),
            on_revert_mint: on_revert_mint_address(&id),
            decimals,
            total_on_finalize_minted: 0,
            total_on_revert_minted: 0,
            created_at: now,
            resolved_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }

    pub fn mint_for(&self, side: Side) -> Address {
        match side {
            Side::OnFinalize => self.on_finalize_mint,
            Side::OnRevert => self.on_revert_mint,
        }
    }

    pub(crate) fn require_active(&self, action: &str) -> Result<()> {
        if !self.is_active() {
            return Err(MarketError::InvalidState(format!(
                "cannot {} on {} vault {}",
                action,
                self.status,
                self.id.short()
            )));
        }
        Ok(())
    }

    pub(crate) fn require_authority(&self, caller: &Address) -> Result<()> {
        if *caller != self.settlement_authority {
            return Err(MarketError::Unauthorized(format!(
                "{} is not the settlement authority of vault {}",
                caller.short(),
                self.id.short()
            )));
        }
        Ok(())
    }
}
