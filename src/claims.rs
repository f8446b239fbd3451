// ============================================================================
// Claim Content Store - Binary Market Core
// ============================================================================
//
// Claim text lives outside the vault in an immutable, content-addressed
// store. The vault only keeps Fingerprint::of_content_id(id). The in-memory
// store here addresses content by its sha256 and is what tests and local
// tooling use in place of the real store.
//
// ============================================================================

use crate::identity::Fingerprint;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub trait ClaimStore {
    /// Store a payload and return its content id. Storing the same bytes
    /// twice returns the same id.
    fn put(&mut self, payload: &[u8]) -> String;

    fn get(&self, content_id: &str) -> Option<&[u8]>;
}

#[derive(Debug, Default)]
pub struct InMemoryClaimStore {
    entries: HashMap<String, Vec<u8>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ClaimStore for InMemoryClaimStore {
    fn put(&mut self, payload: &[u8]) -> String {
        let content_id = hex::encode(Sha256::digest(payload));
        self.entries.entry(content_id.clone()).or_insert_with(|| payload.to_vec());
        content_id
    }

    fn get(&self, content_id: &str) -> Option<&[u8]> {
        self.entries.get(content_id).map(|v| v.as_slice())
    }
}

/// True when `content_id` is stored and is the claim a vault was opened against.
pub fn matches_fingerprint(store: &impl ClaimStore, content_id: &str, fingerprint: &Fingerprint) -> bool {
    store.get(content_id).is_some() && Fingerprint::of_content_id(content_id) == *fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_is_content_addressed() {
        let mut store = InMemoryClaimStore::new();
        let a = store.put(b"Will it rain in Lisbon on 2026-11-01?");
        let b = store.put(b"Will it rain in Lisbon on 2026-11-01?");
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a).unwrap(), b"Will it rain in Lisbon on 2026-11-01?");
    }

    #[test]
    fn test_fingerprint_match() {
        let mut store = InMemoryClaimStore::new();
        let id = store.put(b"claim");
        let fp = Fingerprint::of_content_id(&id);

        assert!(matches_fingerprint(&store, &id, &fp));
        assert!(!matches_fingerprint(&store, &id, &Fingerprint::of_content_id("other")));
        assert!(!matches_fingerprint(&store, "missing", &Fingerprint::of_content_id("missing")));
    }
}
