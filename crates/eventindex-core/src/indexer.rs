//! Indexer configuration and state types.

use serde::{Deserialize, Serialize};

use crate::era::ForkSchedule;
use crate::mode::SyncMode;

/// Which rollup layer a deployment watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainLayer {
    L1,
    L2,
}

impl std::fmt::Display for ChainLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L1 => write!(f, "l1"),
            Self::L2 => write!(f, "l2"),
        }
    }
}

/// Configuration for an indexer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Which layer's contracts this deployment watches.
    pub layer: ChainLayer,
    /// Protocol genesis height — where a resync (or a fresh sync) starts.
    pub genesis_height: u64,
    /// Maximum number of blocks per scan window.
    pub batch_size: u64,
    /// Steady-state scanner tick interval (milliseconds).
    pub poll_interval_ms: u64,
    /// Initial resubscription backoff for the live path (milliseconds).
    pub subscription_backoff_ms: u64,
    /// Resume from persisted state or restart from genesis.
    pub sync_mode: SyncMode,
    /// Index ERC-721/ERC-1155 transfers into NFT balances.
    pub index_nfts: bool,
    /// Index ERC-20 transfers into fungible balances.
    pub index_erc20: bool,
    /// Bridge messages below this value (wei, decimal string) are
    /// skipped.
    pub min_message_value: String,
    /// Hard-fork activation heights for era selection.
    pub fork: ForkSchedule,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            layer: ChainLayer::L1,
            genesis_height: 0,
            batch_size: 100,
            poll_interval_ms: 10_000,
            subscription_backoff_ms: 3_000,
            sync_mode: SyncMode::Sync,
            index_nfts: false,
            index_erc20: false,
            min_message_value: "0".to_string(),
            fork: ForkSchedule::default(),
        }
    }
}

/// Runtime state of the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Catching up to the chain head in batch windows.
    Backfilling,
    /// Following the chain tip via live subscriptions.
    Live,
    /// Terminated.
    Stopped,
    /// Encountered an unrecoverable error.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Backfilling => write!(f, "backfilling"),
            Self::Live => write!(f, "live"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}
