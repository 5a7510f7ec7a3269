//! In-process token metadata cache.
//!
//! Injected into the persisters that need symbol/decimals lookups so
//! that repeated transfers from the same contract do not hit the RPC
//! again within a run. Keyed by `(chain_id, contract_address)`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::types::TokenMetadata;

/// Lock-protected `(chain, contract) → metadata` map. Cheaply cloneable;
/// clones share the same underlying map.
#[derive(Clone, Default)]
pub struct TokenMetadataCache {
    entries: Arc<Mutex<HashMap<(u64, String), TokenMetadata>>>,
}

impl TokenMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chain_id: u64, address: &str) -> Option<TokenMetadata> {
        self.entries
            .lock()
            .unwrap()
            .get(&(chain_id, address.to_ascii_lowercase()))
            .cloned()
    }

    pub fn put(&self, chain_id: u64, address: &str, metadata: TokenMetadata) {
        self.entries
            .lock()
            .unwrap()
            .insert((chain_id, address.to_ascii_lowercase()), metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
