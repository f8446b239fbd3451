// ============================================================================
// Pool Swaps
// ============================================================================
//
//   input_after_fee = input * (10000 - 100) / 10000
//   output          = reserve_out - ceil(k / (reserve_in + input_after_fee))
//
// The whole input (fee included) joins reserve_in. Rounding the quotient up
// keeps the remainder in the pool, which is what keeps k from ever shrinking.
//
// ============================================================================

use super::{Pool, SwapDirection, SWAP_FEE_BPS};
use crate::errors::{MarketError, Result};
use crate::identity::Address;
use crate::ledger::{AssetLedger, AssetOp, Staged};
use crate::math::{self, MAX_BPS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub pool: Address,
    pub direction: SwapDirection,
    pub input_amount: u64,
    pub output_amount: u64,
    /// Part of the input kept as fee
    pub fee_amount: u64,
    /// Spot price after the swap, quote-per-base * 1e12
    pub price_after: u128,
    pub observation_after: u128,
}

impl Pool {
    fn input_output_assets(&self, direction: SwapDirection) -> (Address, Address) {
        match direction {
            SwapDirection::Buy => (self.quote_asset, self.base_asset),
            SwapDirection::Sell => (self.base_asset, self.quote_asset),
        }
    }

    /// Output for `input_amount` against the current reserves. Pure.
    pub fn swap_output(&self, direction: SwapDirection, input_amount: u64) -> Result<u64> {
        if input_amount == 0 {
            return Err(MarketError::InvalidAmount("swap input must be positive".into()));
        }
        if self.base_reserve == 0 || self.quote_reserve == 0 {
            return Err(MarketError::InvalidState(format!("pool {} has no liquidity", self.id.short())));
        }

        let (reserve_in, reserve_out) = match direction {
            SwapDirection::Buy => (self.quote_reserve as u128, self.base_reserve as u128),
            SwapDirection::Sell => (self.base_reserve as u128, self.quote_reserve as u128),
        };

        let input_after_fee =
            math::mul_div_floor(input_amount as u128, (MAX_BPS - SWAP_FEE_BPS) as u128, MAX_BPS as u128)?;
        let new_reserve_in = reserve_in.checked_add(input_after_fee).ok_or(MarketError::MathOverflow)?;
        let new_reserve_out = math::mul_div_ceil(reserve_in, reserve_out, new_reserve_in)?;

        let output = reserve_out
            .checked_sub(new_reserve_out)
            .ok_or_else(|| MarketError::InvariantViolated("swap output underflow".into()))?;
        math::to_u64(output)
    }

    /// Move reserves and the oracle for a swap. Does not look at balances.
    fn apply_swap(&mut self, direction: SwapDirection, input_amount: u64, now: u64) -> Result<SwapReceipt> {
        let k_before = self.k();
        let output_amount = self.swap_output(direction, input_amount)?;

        match direction {
            SwapDirection::Buy => {
                self.quote_reserve = self.quote_reserve.checked_add(input_amount).ok_or(MarketError::MathOverflow)?;
                self.base_reserve -= output_amount;
            }
            SwapDirection::Sell => {
                self.base_reserve = self.base_reserve.checked_add(input_amount).ok_or(MarketError::MathOverflow)?;
                self.quote_reserve -= output_amount;
            }
        }

        let k_after = self.k();
        if k_after < k_before {
            return Err(MarketError::InvariantViolated(format!(
                "k decreased from {} to {}",
                k_before, k_after
            )));
        }

        let price_after = self.spot_price()?;
        self.oracle.update(price_after, now);

        let fee_amount = input_amount - math::to_u64(math::mul_div_floor(
            input_amount as u128,
            (MAX_BPS - SWAP_FEE_BPS) as u128,
            MAX_BPS as u128,
        )?)?;

        Ok(SwapReceipt {
            pool: self.id,
            direction,
            input_amount,
            output_amount,
            fee_amount,
            price_after,
            observation_after: self.oracle.last_observation,
        })
    }

    pub fn swap(
        &mut self,
        ledger: &impl AssetLedger,
        caller: &Address,
        direction: SwapDirection,
        input_amount: u64,
        output_amount_min: u64,
        now: u64,
    ) -> Result<Staged<SwapReceipt>> {
        let (asset_in, asset_out) = self.input_output_assets(direction);

        let available = ledger.balance_of(&asset_in, caller);
        if available < input_amount {
            return Err(MarketError::InsufficientBalance { available, requested: input_amount });
        }

        let output_amount = self.swap_output(direction, input_amount)?;
        if output_amount < output_amount_min {
            return Err(MarketError::SwapSlippageExceeded { output: output_amount, minimum: output_amount_min });
        }

        let receipt = self.apply_swap(direction, input_amount, now)?;

        let ops = vec![
            AssetOp::Transfer {
                asset: asset_in,
                from: *caller,
                to: self.id,
                amount: input_amount,
                authority: *caller,
            },
            AssetOp::Transfer {
                asset: asset_out,
                from: self.id,
                to: *caller,
                amount: receipt.output_amount,
                authority: self.id,
            },
        ];

        Ok(Staged { ops, receipt })
    }

    /// What a swap would do right now, run on a copy of the pool.
    pub fn quote_swap(&self, direction: SwapDirection, input_amount: u64, now: u64) -> Result<SwapReceipt> {
        self.clone().apply_swap(direction, input_amount, now)
    }
}
