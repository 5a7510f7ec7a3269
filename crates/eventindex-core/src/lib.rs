//! eventindex-core — foundation for the reorg-safe event ingestion engine.
//!
//! # Architecture
//!
//! ```text
//! EventIndexer (engine crate)
//!     ├── IndexingCursor       (highest fully indexed block)
//!     ├── ForkSchedule         (era → extraction strategy selection)
//!     ├── ChainReorgDetector   (chain-cursor rollback)
//!     ├── SlotReorgDetector    (per-kind slot replacement)
//!     ├── TokenMetadataCache   (injected, lock-protected)
//!     └── Repository traits    (implemented by eventindex-storage)
//! ```

pub mod cache;
pub mod cursor;
pub mod era;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod mode;
pub mod reorg;
pub mod repo;
pub mod stat;
pub mod types;

pub use cache::TokenMetadataCache;
pub use cursor::IndexingCursor;
pub use era::{ForkEra, ForkSchedule};
pub use error::IndexerError;
pub use indexer::{ChainLayer, IndexerConfig, IndexerState};
pub use mode::SyncMode;
pub use reorg::{ChainReorgDetector, ReorgOutcome, SlotReorgDetector};
pub use repo::{
    BlockRepository, Erc20BalanceRepository, EventRepository, NftBalanceRepository, StatRepository,
};
pub use stat::{Stat, StatKind};
pub use types::{
    BalanceChange, BlockHeader, Erc20Metadata, EventKind, LogFilter, NewEvent, RawLog, StoredEvent,
    TokenMetadata, TokenStandard, ZERO_ADDRESS,
};
