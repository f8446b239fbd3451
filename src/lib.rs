/// Binary Market Core
/// Conditional vaults, constant-product pools and TWAP oracles for
/// binary-outcome prediction markets. Exports all modules for use as a library crate

pub mod amm;
pub mod claims;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod math;
pub mod snapshot;
pub mod vault;

// Core engine
pub use engine::{Engine, HostLedger, SharedEngine};
pub use errors::{MarketError, Result};
pub use config::EngineConfig;
pub use snapshot::EngineSnapshot;

// Conditional vaults
pub use vault::{
    ConditionalTokenMetadata, ConditionalVault, MergeReceipt, MintReceipt, RedeemReceipt, Side, SweepReceipt,
    VaultStatus,
};

// AMM pools and oracle
pub use amm::{
    AddLiquidityReceipt, Pool, RemoveLiquidityReceipt, SwapDirection, SwapReceipt, TwapOracle, SWAP_FEE_BPS,
};

// Collaborator interfaces and their in-memory implementations
pub use claims::{ClaimStore, InMemoryClaimStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{Address, Fingerprint};
pub use ledger::{AssetInfo, AssetLedger, AssetOp, Ledger, Staged, TokenMetadata};

pub use events::{EngineEvent, EventJournal, EventKind};
pub use math::{SlippageDirection, PRICE_SCALE};
