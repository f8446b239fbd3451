// ============================================================================
// Constant-Product AMM - Binary Market Core
// ============================================================================
//
// One pool per (base, quote) pair. Prices follow x * y = k:
//   - A 1% fee on every swap stays in the pool, so k only ever grows
//   - LP shares are an asset minted by the pool itself
//   - Every swap feeds the pool's TWAP oracle
//
// Like the vault, pool methods mutate the pool value and hand back the ledger
// ops to commit; nothing touches balances directly.
//
// ============================================================================

pub mod liquidity;
pub mod oracle;
pub mod swap;

pub use liquidity::{AddLiquidityReceipt, RemoveLiquidityReceipt};
pub use oracle::TwapOracle;
pub use swap::SwapReceipt;

use crate::errors::Result;
use crate::identity::{lp_mint_address, pool_address, Address};
use crate::math;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Swap fee retained by the pool
pub const SWAP_FEE_BPS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    /// Quote in, base out
    Buy,
    /// Base in, quote out
    Sell,
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapDirection::Buy => write!(f, "buy"),
            SwapDirection::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: Address,
    pub base_asset: Address,
    pub quote_asset: Address,
    pub lp_mint: Address,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub base_reserve: u64,
    pub quote_reserve: u64,
    pub lp_supply: u64,
    pub oracle: TwapOracle,
    pub created_at_slot: u64,
}

impl Pool {
    pub fn new(
        base_asset: Address,
        quote_asset: Address,
        base_decimals: u8,
        quote_decimals: u8,
        initial_observation: u128,
        max_observation_change_per_update: u128,
        now: u64,
    ) -> Self {
        let id = pool_address(&base_asset, &quote_asset);
        Self {
            id,
            base_asset,
            quote_asset,
            lp_mint: lp_mint_address(&id),
            base_decimals,
            quote_decimals,
            base_reserve: 0,
            quote_reserve: 0,
            lp_supply: 0,
            oracle: TwapOracle::new(now, initial_observation, max_observation_change_per_update),
            created_at_slot: now,
        }
    }

    pub fn k(&self) -> u128 {
        // u64::MAX * u64::MAX fits in u128
        self.base_reserve as u128 * self.quote_reserve as u128
    }

    pub fn is_empty(&self) -> bool {
        self.lp_supply == 0
    }

    /// Spot price from reserves, quote-per-base * 1e12
    pub fn spot_price(&self) -> Result<u128> {
        math::price_from_reserves(self.base_reserve, self.quote_reserve)
    }
}
