// ============================================================================
// Fixed-Point Math - Binary Market Core
// ============================================================================
//
// Amounts on the ledger are integers in base units (u64). Prices are quote
// base-units per base base-unit, multiplied by PRICE_SCALE (1e12) and held
// in u128. Human-facing amounts go through rust_decimal so that fractional
// digits are never routed through binary floating point.
//
// ============================================================================

use crate::errors::{MarketError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Scale applied to every AMM price
pub const PRICE_SCALE: u128 = 1_000_000_000_000;

/// Basis-point denominator
pub const MAX_BPS: u64 = 10_000;

/// Largest decimals value an asset may declare
pub const MAX_DECIMALS: u32 = 18;

/// Direction of a slippage adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlippageDirection {
    /// Widen a maximum input: amount * (10000 + bps) / 10000
    Add,
    /// Tighten a minimum output: amount * (10000 - bps) / 10000
    Subtract,
}

// ============================================================================
// HUMAN <-> BASE UNITS
// ============================================================================

/// Convert a human amount (e.g. `12.5` tokens) into base units.
///
/// Fractional digits finer than `decimals` are truncated toward zero.
pub fn scale(human: Decimal, decimals: u32) -> Result<u64> {
    let factor = pow10_decimal(decimals)?;
    if human.is_sign_negative() && !human.is_zero() {
        return Err(MarketError::InvalidAmount(format!("negative amount {}", human)));
    }
    human
        .checked_mul(factor)
        .ok_or(MarketError::MathOverflow)?
        .trunc()
        .to_u64()
        .ok_or(MarketError::MathOverflow)
}

/// Convert base units back into a human amount.
pub fn unscale(amount: u64, decimals: u32) -> Result<Decimal> {
    check_decimals(decimals)?;
    Decimal::try_from_i128_with_scale(amount as i128, decimals).map_err(|_| MarketError::MathOverflow)
}

// ============================================================================
// PRICES
// ============================================================================

/// Instantaneous pool price: `quote * PRICE_SCALE / base`.
pub fn price_from_reserves(base_reserve: u64, quote_reserve: u64) -> Result<u128> {
    if base_reserve == 0 {
        return Err(MarketError::DivideByZero);
    }
    // u64::MAX * 1e12 fits comfortably in u128
    Ok(quote_reserve as u128 * PRICE_SCALE / base_reserve as u128)
}

/// Convert a human quote-per-base price into the scaled AMM price,
/// correcting for the difference between base and quote decimals.
pub fn ui_price_to_amm_price(price: Decimal, base_decimals: u32, quote_decimals: u32) -> Result<u128> {
    check_decimals(base_decimals)?;
    check_decimals(quote_decimals)?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(MarketError::InvalidAmount(format!("negative price {}", price)));
    }

    let price_1e12 = price
        .checked_mul(Decimal::from(PRICE_SCALE as u64))
        .ok_or(MarketError::MathOverflow)?
        .trunc()
        .to_u128()
        .ok_or(MarketError::MathOverflow)?;

    if quote_decimals > base_decimals {
        price_1e12
            .checked_mul(pow10(quote_decimals - base_decimals))
            .ok_or(MarketError::MathOverflow)
    } else {
        Ok(price_1e12 / pow10(base_decimals - quote_decimals))
    }
}

/// Inverse of [`ui_price_to_amm_price`].
pub fn amm_price_to_ui_price(price: u128, base_decimals: u32, quote_decimals: u32) -> Result<Decimal> {
    check_decimals(base_decimals)?;
    check_decimals(quote_decimals)?;

    let price_1e12 = if quote_decimals > base_decimals {
        price / pow10(quote_decimals - base_decimals)
    } else {
        price
            .checked_mul(pow10(base_decimals - quote_decimals))
            .ok_or(MarketError::MathOverflow)?
    };

    let mantissa = i128::try_from(price_1e12).map_err(|_| MarketError::MathOverflow)?;
    Decimal::try_from_i128_with_scale(mantissa, 12).map_err(|_| MarketError::MathOverflow)
}

// ============================================================================
// SLIPPAGE
// ============================================================================

/// `amount * (10000 ± bps) / 10000`, truncating toward zero.
pub fn apply_slippage(amount: u64, bps: u64, direction: SlippageDirection) -> Result<u64> {
    let factor = match direction {
        SlippageDirection::Add => MAX_BPS.checked_add(bps).ok_or(MarketError::MathOverflow)?,
        SlippageDirection::Subtract => MAX_BPS.checked_sub(bps).ok_or_else(|| {
            MarketError::InvalidAmount(format!("cannot subtract {} bps", bps))
        })?,
    };
    let adjusted = mul_div_floor(amount as u128, factor as u128, MAX_BPS as u128)?;
    to_u64(adjusted)
}

// ============================================================================
// CHECKED HELPERS
// ============================================================================

/// `a * b / c`, truncating.
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(MarketError::DivideByZero);
    }
    Ok(a.checked_mul(b).ok_or(MarketError::MathOverflow)? / c)
}

/// `a * b / c`, rounded up.
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(MarketError::DivideByZero);
    }
    let numerator = a.checked_mul(b).ok_or(MarketError::MathOverflow)?;
    let quotient = numerator / c;
    if numerator % c == 0 {
        Ok(quotient)
    } else {
        Ok(quotient + 1)
    }
}

pub fn to_u64(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| MarketError::MathOverflow)
}

fn check_decimals(decimals: u32) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(MarketError::InvalidAmount(format!(
            "decimals {} above maximum {}",
            decimals, MAX_DECIMALS
        )));
    }
    Ok(())
}

fn pow10(exp: u32) -> u128 {
    10u128.pow(exp)
}

fn pow10_decimal(decimals: u32) -> Result<Decimal> {
    check_decimals(decimals)?;
    Ok(Decimal::from(10u64.pow(decimals)))
}

// ============================================================================
// TESTS
// ============================================================================
