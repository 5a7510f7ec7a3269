//! Fluent builder API for indexer configuration.
//!
//! # Example
//!
//! ```rust
//! use eventindex_engine::IndexerBuilder;
//! use eventindex_core::{ForkSchedule, SyncMode};
//!
//! let config = IndexerBuilder::new()
//!     .genesis_height(1)
//!     .batch_size(500)
//!     .sync_mode(SyncMode::Sync)
//!     .index_nfts(true)
//!     .fork(ForkSchedule { pacaya_height: Some(10_000), shasta_height: None })
//!     .build_config();
//! ```

use eventindex_core::era::ForkSchedule;
use eventindex_core::indexer::{ChainLayer, IndexerConfig};
use eventindex_core::mode::SyncMode;

/// Fluent builder for [`IndexerConfig`].
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self { config: IndexerConfig::default() }
    }

    pub fn layer(mut self, layer: ChainLayer) -> Self {
        self.config.layer = layer;
        self
    }

    pub fn genesis_height(mut self, height: u64) -> Self {
        self.config.genesis_height = height;
        self
    }

    pub fn batch_size(mut self, size: u64) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn subscription_backoff_ms(mut self, ms: u64) -> Self {
        self.config.subscription_backoff_ms = ms;
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    pub fn index_nfts(mut self, enabled: bool) -> Self {
        self.config.index_nfts = enabled;
        self
    }

    pub fn index_erc20(mut self, enabled: bool) -> Self {
        self.config.index_erc20 = enabled;
        self
    }

    /// Bridge messages below this wei value are not indexed.
    pub fn min_message_value(mut self, value: impl Into<String>) -> Self {
        self.config.min_message_value = value.into();
        self
    }

    pub fn fork(mut self, schedule: ForkSchedule) -> Self {
        self.config.fork = schedule;
        self
    }

    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}
