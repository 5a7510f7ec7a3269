//! eventindex-engine — block-batch indexing and live-subscription engine.
//!
//! # Architecture
//!
//! ```text
//! EventIndexer
//!     ├── sync::starting_block   (Sync resume / Resync from genesis)
//!     ├── BatchRangeScanner      (windowed backfill + steady-state ticks)
//!     │       └── FilterStrategy (LegacyL1 / Pacaya / Shasta fan-out)
//!     │               └── Persisters (one per event family)
//!     └── LiveSubscriber         (per-kind push subscriptions + backoff)
//!                 └── Persisters (same functions as the batch path)
//! ```
//!
//! The engine is embeddable: supply a [`ChainClient`], an
//! [`EventSource`] (the decoded-bindings boundary), and the repository
//! implementations, then drive [`EventIndexer::start`] under a
//! cancellation token.

mod backoff;
mod builder;
mod chain;
mod events;
mod indexer;
mod persist;
mod scanner;
mod strategy;
mod subscriber;
mod sync;

#[cfg(test)]
mod testing;

pub use backoff::SubscribeBackoff;
pub use builder::IndexerBuilder;
pub use chain::ChainClient;
pub use events::{
    BatchProposedData, BatchesProvedData, BatchesVerifiedData, BlockProposedData,
    BlockProvenData, BlockVerifiedData, ChainEvent, EventSource, LogMeta, MessageSentData,
    ProposedData, ProvedData, SourcedEvent,
};
pub use indexer::{EventIndexer, IndexerContext};
pub use persist::{decode, Persisted, Persisters};
pub use scanner::BatchRangeScanner;
pub use strategy::FilterStrategy;
pub use subscriber::{LiveSubscriber, TRANSFER_MARKER_KIND};
pub use sync::starting_block;
