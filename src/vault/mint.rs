// ============================================================================
// Conditional Minting & Merging
// ============================================================================
//
// Mint:  caller deposits N collateral, receives N on-finalize + N on-revert.
// Merge: caller returns N of each kind, gets N collateral back.
//
// Both only run while the vault is Active, and both keep the supply of each
// conditional kind equal to collateral_held.
//
// ============================================================================

use super::{ConditionalVault, Side};
use crate::errors::{MarketError, Result};
use crate::identity::Address;
use crate::ledger::{AssetLedger, AssetOp, Staged};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub vault: Address,
    pub amount: u64,
    pub side_hint: Option<Side>,
    pub collateral_held: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReceipt {
    pub vault: Address,
    pub amount: u64,
    pub collateral_held: u64,
}

impl ConditionalVault {
    pub fn mint_conditional_tokens(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
        amount: u64,
        side_hint: Option<Side>,
    ) -> Result<Staged<MintReceipt>> {
        self.require_active("mint")?;
        if amount == 0 {
            return Err(MarketError::InvalidAmount("mint amount must be positive".into()));
        }

        let available = ledger.balance_of(&self.collateral_asset, caller);
        if available < amount {
            return Err(MarketError::InsufficientBalance { available, requested: amount });
        }

        self.collateral_held = self.collateral_held.checked_add(amount).ok_or(MarketError::MathOverflow)?;
        self.total_on_finalize_minted = self
            .total_on_finalize_minted
            .checked_add(amount)
            .ok_or(MarketError::MathOverflow)?;
        self.total_on_revert_minted = self
            .total_on_revert_minted
            .checked_add(amount)
            .ok_or(MarketError::MathOverflow)?;

        let ops = vec![
            AssetOp::Transfer {
                asset: self.collateral_asset,
                from: *caller,
                to: self.id,
                amount,
                authority: *caller,
            },
            AssetOp::Mint { asset: self.on_finalize_mint, to: *caller, amount, authority: self.id },
            AssetOp::Mint { asset: self.on_revert_mint, to: *caller, amount, authority: self.id },
        ];

        Ok(Staged {
            ops,
            receipt: MintReceipt { vault: self.id, amount, side_hint, collateral_held: self.collateral_held },
        })
    }

    /// Burn `amount` complete sets and release the matching collateral.
    pub fn merge_conditional_tokens(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
        amount: u64,
    ) -> Result<Staged<MergeReceipt>> {
        self.require_active("merge")?;
        if amount == 0 {
            return Err(MarketError::InvalidAmount("merge amount must be positive".into()));
        }

        for mint in [self.on_finalize_mint, self.on_revert_mint] {
            let available = ledger.balance_of(&mint, caller);
            if available < amount {
                return Err(MarketError::InsufficientBalance { available, requested: amount });
            }
        }

        if amount > self.collateral_held {
            return Err(MarketError::InsufficientVaultFunds { held: self.collateral_held, payout: amount });
        }
        self.collateral_held -= amount;

        let ops = vec![
            AssetOp::Burn { asset: self.on_finalize_mint, from: *caller, amount, authority: *caller },
            AssetOp::Burn { asset: self.on_revert_mint, from: *caller, amount, authority: *caller },
            AssetOp::Transfer {
                asset: self.collateral_asset,
                from: self.id,
                to: *caller,
                amount,
                authority: self.id,
            },
        ];

        Ok(Staged {
            ops,
            receipt: MergeReceipt { vault: self.id, amount, collateral_held: self.collateral_held },
        })
    }
}
