// ============================================================================
// Identity Derivation - Binary Market Core
// ============================================================================
//
// Vaults, pools, their mints and the principals that use them are all named
// by a 32-byte Address. Entity addresses are derived from a domain tag plus a
// tuple of seeds, so the same inputs always land on the same key and the
// registry can reject a second entity for the same tuple.
//
//   vault            = H("conditional_vault", authority, collateral, fingerprint)
//   on-finalize mint = H("conditional_on_finalize_mint", vault)
//   on-revert mint   = H("conditional_on_revert_mint", vault)
//   pool             = H("amm", base, quote)
//   lp mint          = H("amm_lp_mint", pool)
//
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const VAULT_SEED: &str = "conditional_vault";
pub const ON_FINALIZE_MINT_SEED: &str = "conditional_on_finalize_mint";
pub const ON_REVERT_MINT_SEED: &str = "conditional_on_revert_mint";
pub const POOL_SEED: &str = "amm";
pub const LP_MINT_SEED: &str = "amm_lp_mint";

const PRINCIPAL_SEED: &str = "principal";

macro_rules! hex_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// First eight hex chars, for log lines
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok($name(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_newtype!(Address);
hex_newtype!(Fingerprint);

impl Address {
    /// Stable address for a named principal (test accounts, issuers).
    pub fn from_label(label: &str) -> Self {
        derive_address(PRINCIPAL_SEED, &[label.as_bytes()])
    }
}

impl Fingerprint {
    /// Fixed-size fingerprint of an external content id.
    pub fn of_content_id(content_id: &str) -> Self {
        Fingerprint(Sha256::digest(content_id.as_bytes()).into())
    }
}

/// Derive an entity address from a domain tag and seed tuple.
///
/// Seeds are length-prefixed so that ("ab", "c") and ("a", "bc") differ.
pub fn derive_address(tag: &str, seeds: &[&[u8]]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update((tag.len() as u32).to_le_bytes());
    hasher.update(tag.as_bytes());
    for seed in seeds {
        hasher.update((seed.len() as u32).to_le_bytes());
        hasher.update(seed);
    }
    Address(hasher.finalize().into())
}

pub fn vault_address(settlement_authority: &Address, collateral: &Address, fingerprint: &Fingerprint) -> Address {
    derive_address(
        VAULT_SEED,
        &[settlement_authority.as_bytes(), collateral.as_bytes(), fingerprint.as_bytes()],
    )
}

pub fn on_finalize_mint_address(vault: &Address) -> Address {
    derive_address(ON_FINALIZE_MINT_SEED, &[vault.as_bytes()])
}

pub fn on_revert_mint_address(vault: &Address) -> Address {
    derive_address(ON_REVERT_MINT_SEED, &[vault.as_bytes()])
}

pub fn pool_address(base: &Address, quote: &Address) -> Address {
    derive_address(POOL_SEED, &[base.as_bytes(), quote.as_bytes()])
}

pub fn lp_mint_address(pool: &Address) -> Address {
    derive_address(LP_MINT_SEED, &[pool.as_bytes()])
}
