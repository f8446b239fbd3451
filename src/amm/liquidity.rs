// ============================================================================
// Pool Liquidity
// ============================================================================
//
// Add:
//   first deposit   base = quote * 1e12 / last_observation   (floor)
//                   lp   = quote
//   later deposits  base = quote * base_reserve / quote_reserve  (ceil)
//                   lp   = quote * lp_supply / quote_reserve     (floor)
//
// Remove:
//   out = reserve * burned / lp_supply  (floor, per side)
//
// Every rounding step favours the pool. Liquidity changes leave the oracle
// alone.
//
// ============================================================================

use super::Pool;
use crate::errors::{MarketError, Result};
use crate::identity::Address;
use crate::ledger::{AssetLedger, AssetOp, Staged};
use crate::math::{self, PRICE_SCALE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityReceipt {
    pub pool: Address,
    pub base_deposited: u64,
    pub quote_deposited: u64,
    pub lp_minted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityReceipt {
    pub pool: Address,
    pub lp_burned: u64,
    pub base_withdrawn: u64,
    pub quote_withdrawn: u64,
}

impl Pool {
    /// Base and LP amounts for a deposit of `quote_amount`, without checks
    /// against caller limits.
    pub fn deposit_amounts(&self, quote_amount: u64) -> Result<(u64, u64)> {
        if self.is_empty() {
            let base = math::mul_div_floor(quote_amount as u128, PRICE_SCALE, self.oracle.last_observation)?;
            Ok((math::to_u64(base)?, quote_amount))
        } else {
            let quote_reserve = self.quote_reserve as u128;
            let base = math::mul_div_ceil(quote_amount as u128, self.base_reserve as u128, quote_reserve)?;
            let lp = math::mul_div_floor(quote_amount as u128, self.lp_supply as u128, quote_reserve)?;
            Ok((math::to_u64(base)?, math::to_u64(lp)?))
        }
    }

    pub fn add_liquidity(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
        quote_amount: u64,
        max_base_amount: u64,
        min_lp_tokens: u64,
    ) -> Result<Staged<AddLiquidityReceipt>> {
        if quote_amount == 0 {
            return Err(MarketError::InvalidAmount("quote amount must be positive".into()));
        }

        let (base_amount, lp_tokens) = self.deposit_amounts(quote_amount)?;
        if base_amount == 0 || lp_tokens == 0 {
            return Err(MarketError::InvalidAmount(format!(
                "deposit of {} quote is too small for this pool",
                quote_amount
            )));
        }
        if base_amount > max_base_amount {
            return Err(MarketError::AddLiquidityMaxBaseExceeded { required: base_amount, max: max_base_amount });
        }
        if lp_tokens < min_lp_tokens {
            return Err(MarketError::SlippageExceeded(format!(
                "would mint {} LP tokens, minimum {}",
                lp_tokens, min_lp_tokens
            )));
        }

        for (asset, needed) in [(self.base_asset, base_amount), (self.quote_asset, quote_amount)] {
            let available = ledger.balance_of(&asset, caller);
            if available < needed {
                return Err(MarketError::InsufficientBalance { available, requested: needed });
            }
        }

        self.base_reserve = self.base_reserve.checked_add(base_amount).ok_or(MarketError::MathOverflow)?;
        self.quote_reserve = self.quote_reserve.checked_add(quote_amount).ok_or(MarketError::MathOverflow)?;
        self.lp_supply = self.lp_supply.checked_add(lp_tokens).ok_or(MarketError::MathOverflow)?;

        let ops = vec![
            AssetOp::Transfer {
                asset: self.base_asset,
                from: *caller,
                to: self.id,
                amount: base_amount,
                authority: *caller,
            },
            AssetOp::Transfer {
                asset: self.quote_asset,
                from: *caller,
                to: self.id,
                amount: quote_amount,
                authority: *caller,
            },
            AssetOp::Mint { asset: self.lp_mint, to: *caller, amount: lp_tokens, authority: self.id },
        ];

        Ok(Staged {
            ops,
            receipt: AddLiquidityReceipt {
                pool: self.id,
                base_deposited: base_amount,
                quote_deposited: quote_amount,
                lp_minted: lp_tokens,
            },
        })
    }

    pub fn remove_liquidity(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
        lp_tokens_to_burn: u64,
        min_base_amount: u64,
        min_quote_amount: u64,
    ) -> Result<Staged<RemoveLiquidityReceipt>> {
        if lp_tokens_to_burn == 0 {
            return Err(MarketError::InvalidAmount("LP amount must be positive".into()));
        }
        if self.is_empty() {
            return Err(MarketError::InvalidState(format!("pool {} has no liquidity", self.id.short())));
        }

        let held = ledger.balance_of(&self.lp_mint, caller);
        if held < lp_tokens_to_burn {
            return Err(MarketError::InsufficientBalance { available: held, requested: lp_tokens_to_burn });
        }
        if lp_tokens_to_burn > self.lp_supply {
            return Err(MarketError::InvariantViolated(format!(
                "LP balance {} above pool supply {}",
                held, self.lp_supply
            )));
        }

        let supply = self.lp_supply as u128;
        let base_out = math::to_u64(math::mul_div_floor(self.base_reserve as u128, lp_tokens_to_burn as u128, supply)?)?;
        let quote_out = math::to_u64(math::mul_div_floor(self.quote_reserve as u128, lp_tokens_to_burn as u128, supply)?)?;

        if base_out < min_base_amount || quote_out < min_quote_amount {
            return Err(MarketError::SlippageExceeded(format!(
                "would withdraw {} base / {} quote, minimum {} / {}",
                base_out, quote_out, min_base_amount, min_quote_amount
            )));
        }

        self.base_reserve -= base_out;
        self.quote_reserve -= quote_out;
        self.lp_supply -= lp_tokens_to_burn;

        let ops = vec![
            AssetOp::Burn { asset: self.lp_mint, from: *caller, amount: lp_tokens_to_burn, authority: *caller },
            AssetOp::Transfer {
                asset: self.base_asset,
                from: self.id,
                to: *caller,
                amount: base_out,
                authority: self.id,
            },
            AssetOp::Transfer {
                asset: self.quote_asset,
                from: self.id,
                to: *caller,
                amount: quote_out,
                authority: self.id,
            },
        ];

        Ok(Staged {
            ops,
            receipt: RemoveLiquidityReceipt {
                pool: self.id,
                lp_burned: lp_tokens_to_burn,
                base_withdrawn: base_out,
                quote_withdrawn: quote_out,
            },
        })
    }
}
