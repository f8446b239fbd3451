// ============================================================================
// Errors - Binary Market Core
// ============================================================================
//
// Every operation on a vault, pool or the asset ledger returns MarketError.
// Nothing is retried internally; the caller decides what to do.
//
// ============================================================================

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketError {
    /// Operation not legal in the entity's current status
    InvalidState(String),
    /// Caller lacks the required principal role
    Unauthorized(String),
    /// Caller-side funds are short
    InsufficientBalance { available: u64, requested: u64 },
    /// Vault would pay out more than it escrows (consistency fault)
    InsufficientVaultFunds { held: u64, payout: u64 },
    /// Deterministic identity already taken
    AlreadyExists(String),
    AddLiquidityMaxBaseExceeded { required: u64, max: u64 },
    SlippageExceeded(String),
    SwapSlippageExceeded { output: u64, minimum: u64 },
    /// Price query against an empty reserve
    DivideByZero,
    InvalidAmount(String),
    MathOverflow,
    NotFound(String),
    UnknownAsset(String),
    /// Internal accounting check failed (consistency fault)
    InvariantViolated(String),
    Persistence(String),
}

impl MarketError {
    /// Faults that mean the books no longer add up. These are never a caller
    /// mistake and must not be swallowed.
    pub fn is_consistency_fault(&self) -> bool {
        matches!(
            self,
            MarketError::InsufficientVaultFunds { .. } | MarketError::InvariantViolated(_)
        )
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            MarketError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            MarketError::InsufficientBalance { available, requested } => {
                write!(f, "Insufficient balance: have {}, need {}", available, requested)
            }
            MarketError::InsufficientVaultFunds { held, payout } => {
                write!(f, "Insufficient vault funds: holds {}, owes {}", held, payout)
            }
            MarketError::AlreadyExists(id) => write!(f, "Already exists: {}", id),
            MarketError::AddLiquidityMaxBaseExceeded { required, max } => {
                write!(f, "Add liquidity needs {} base, max is {}", required, max)
            }
            MarketError::SlippageExceeded(msg) => write!(f, "Slippage exceeded: {}", msg),
            MarketError::SwapSlippageExceeded { output, minimum } => {
                write!(f, "Swap slippage exceeded: output {} below minimum {}", output, minimum)
            }
            MarketError::DivideByZero => write!(f, "Divide by zero"),
            MarketError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            MarketError::MathOverflow => write!(f, "Math overflow"),
            MarketError::NotFound(id) => write!(f, "Not found: {}", id),
            MarketError::UnknownAsset(id) => write!(f, "Unknown asset: {}", id),
            MarketError::InvariantViolated(msg) => write!(f, "Invariant violated: {}", msg),
            MarketError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
        }
    }
}

impl std::error::Error for MarketError {}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for MarketError {
    fn from(err: std::io::Error) -> Self {
        MarketError::Persistence(err.to_string())
    }
}
