// ============================================================================
// Conditional Redemption
// ============================================================================
//
// Once a vault leaves Active, a holder redeems by burning everything they hold
// of both conditional kinds:
//
//   Finalized(true)   payout = on-finalize balance
//   Finalized(false)  payout = on-revert balance
//   Reverted          payout = (on-finalize + on-revert) / 2
//
// In the reverted case each complete set (one of each kind) was one unit of
// collateral, so n sets refund exactly n. An odd leftover unit rounds down
// and stays in the vault until the settlement authority sweeps it, which is
// allowed once no conditional tokens of either kind remain.
//
// ============================================================================

use super::{ConditionalVault, VaultStatus};
use crate::errors::{MarketError, Result};
use crate::identity::Address;
use crate::ledger::{AssetLedger, AssetOp, Staged};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemReceipt {
    pub vault: Address,
    pub on_finalize_burned: u64,
    pub on_revert_burned: u64,
    pub payout: u64,
    pub collateral_held: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReceipt {
    pub vault: Address,
    pub swept: u64,
}

impl ConditionalVault {
    /// Collateral owed for the given balances under the current status.
    ///
    /// Reverted payouts round down, so a holder with an odd total leaves one
    /// unit behind. See `sweep_residual_collateral`.
    pub fn redemption_payout(&self, on_finalize_amount: u64, on_revert_amount: u64) -> Result<u64> {
        match self.status {
            VaultStatus::Active => Err(MarketError::InvalidState(format!(
                "vault {} has not been settled",
                self.id.short()
            ))),
            VaultStatus::Finalized { outcome: true } => Ok(on_finalize_amount),
            VaultStatus::Finalized { outcome: false } => Ok(on_revert_amount),
            VaultStatus::Reverted => {
                let sets = (on_finalize_amount as u128 + on_revert_amount as u128) / 2;
                // at most u64::MAX since both halves are u64
                Ok(sets as u64)
            }
        }
    }

    pub fn redeem_conditional_tokens(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
    ) -> Result<Staged<RedeemReceipt>> {
        let on_finalize_amount = ledger.balance_of(&self.on_finalize_mint, caller);
        let on_revert_amount = ledger.balance_of(&self.on_revert_mint, caller);
        let payout = self.redemption_payout(on_finalize_amount, on_revert_amount)?;

        if payout > self.collateral_held {
            return Err(MarketError::InsufficientVaultFunds { held: self.collateral_held, payout });
        }
        self.collateral_held -= payout;

        let mut ops = Vec::with_capacity(3);
        if on_finalize_amount > 0 {
            ops.push(AssetOp::Burn {
                asset: self.on_finalize_mint,
                from: *caller,
                amount: on_finalize_amount,
                authority: *caller,
            });
        }
        if on_revert_amount > 0 {
            ops.push(AssetOp::Burn {
                asset: self.on_revert_mint,
                from: *caller,
                amount: on_revert_amount,
                authority: *caller,
            });
        }
        if payout > 0 {
            ops.push(AssetOp::Transfer {
                asset: self.collateral_asset,
                from: self.id,
                to: *caller,
                amount: payout,
                authority: self.id,
            });
        }

        Ok(Staged {
            ops,
            receipt: RedeemReceipt {
                vault: self.id,
                on_finalize_burned: on_finalize_amount,
                on_revert_burned: on_revert_amount,
                payout,
                collateral_held: self.collateral_held,
            },
        })
    }

    /// Hand collateral nobody can claim any more to the settlement authority.
    /// Needs a settled vault with zero supply of both conditional kinds.
    pub fn sweep_residual_collateral(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
    ) -> Result<Staged<SweepReceipt>> {
        self.require_authority(caller)?;
        if !self.status.is_terminal() {
            return Err(MarketError::InvalidState(format!(
                "vault {} has not been settled",
                self.id.short()
            )));
        }
        for mint in [self.on_finalize_mint, self.on_revert_mint] {
            let outstanding = ledger.supply_of(&mint).unwrap_or(0);
            if outstanding > 0 {
                return Err(MarketError::InvalidState(format!(
                    "{} conditional tokens of {} still outstanding",
                    outstanding,
                    mint.short()
                )));
            }
        }

        let swept = self.collateral_held;
        self.collateral_held = 0;

        let mut ops = Vec::with_capacity(1);
        if swept > 0 {
            ops.push(AssetOp::Transfer {
                asset: self.collateral_asset,
                from: self.id,
                to: *caller,
                amount: swept,
                authority: self.id,
            });
        }

        Ok(Staged { ops, receipt: SweepReceipt { vault: self.id, swept } })
    }
}
