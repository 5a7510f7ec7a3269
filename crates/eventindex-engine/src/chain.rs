//! Chain client boundary.
//!
//! The engine never talks JSON-RPC directly: everything it needs from a
//! node goes through [`ChainClient`]. Implementations wrap an RPC
//! provider (HTTP for range queries, WebSocket for head subscriptions)
//! and are supplied by the embedding process.

use async_trait::async_trait;
use tokio::sync::mpsc;

use eventindex_core::error::IndexerError;
use eventindex_core::types::{BlockHeader, LogFilter, RawLog, TokenMetadata};

/// RPC facade consumed by the scanner, persisters, and subscriber.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The chain id the client is connected to.
    async fn chain_id(&self) -> Result<u64, IndexerError>;

    /// Current head block number.
    async fn head_number(&self) -> Result<u64, IndexerError>;

    /// Header lookup, used for block timestamp resolution.
    async fn header_by_number(&self, number: u64) -> Result<BlockHeader, IndexerError>;

    /// Sender address of a transaction, recovered by the node.
    async fn transaction_sender(&self, tx_hash: &str) -> Result<String, IndexerError>;

    /// Raw logs matching `filter`, in emission order.
    async fn filter_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, IndexerError>;

    /// Push subscription to new chain heads. The channel closing means
    /// the underlying subscription dropped; callers resubscribe.
    async fn subscribe_heads(&self) -> Result<mpsc::Receiver<BlockHeader>, IndexerError>;

    /// Symbol/decimals resolution for a token contract. This is a thin
    /// I/O boundary; `None` means the contract does not expose metadata.
    async fn token_metadata(&self, address: &str) -> Result<Option<TokenMetadata>, IndexerError>;
}
