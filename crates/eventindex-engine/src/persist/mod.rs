//! Event persisters — map decoded events into normalized records.
//!
//! One persister per event family, all hanging off the shared
//! [`Persisters`] context. Every persister follows the same contract:
//! filter out uninteresting instances, resolve auxiliary chain data
//! (block timestamp, transaction sender), run the appropriate reorg
//! detector, write the record, and bump the processed/error counters.
//!
//! Persister failures abort the whole scan window; the scanner retries
//! the identical window on its next tick, and the reorg detectors make
//! the retry idempotent.

mod batches;
mod block_lifecycle;
mod bridge;
pub mod decode;
mod proposals;
mod transfers;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use eventindex_core::cache::TokenMetadataCache;
use eventindex_core::cursor::IndexingCursor;
use eventindex_core::error::IndexerError;
use eventindex_core::indexer::IndexerConfig;
use eventindex_core::metrics;
use eventindex_core::reorg::{ChainReorgDetector, SlotReorgDetector};
use eventindex_core::repo::{
    Erc20BalanceRepository, EventRepository, NftBalanceRepository, StatRepository,
};
use eventindex_core::stat::{Stat, StatKind};

use crate::chain::ChainClient;
use crate::events::{ChainEvent, SourcedEvent};

/// What a persister did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// A record was written.
    Saved,
    /// The event was filtered out (below threshold, malformed span).
    Skipped,
}

/// Shared context for every event persister.
pub struct Persisters {
    pub(crate) chain_id: u64,
    pub(crate) config: IndexerConfig,
    pub(crate) client: Arc<dyn ChainClient>,
    pub(crate) events: Arc<dyn EventRepository>,
    pub(crate) nft_balances: Arc<dyn NftBalanceRepository>,
    pub(crate) erc20_balances: Arc<dyn Erc20BalanceRepository>,
    pub(crate) stats: Arc<dyn StatRepository>,
    pub(crate) metadata_cache: TokenMetadataCache,
    pub(crate) chain_reorg: ChainReorgDetector,
    pub(crate) slot_reorg: SlotReorgDetector,
    /// Shared with the scanner so a chain-level rollback resets the
    /// cursor to the divergence point.
    pub(crate) cursor: Arc<Mutex<IndexingCursor>>,
}

impl Persisters {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: u64,
        config: IndexerConfig,
        client: Arc<dyn ChainClient>,
        events: Arc<dyn EventRepository>,
        nft_balances: Arc<dyn NftBalanceRepository>,
        erc20_balances: Arc<dyn Erc20BalanceRepository>,
        stats: Arc<dyn StatRepository>,
        metadata_cache: TokenMetadataCache,
        cursor: Arc<Mutex<IndexingCursor>>,
    ) -> Self {
        Self {
            chain_id,
            config,
            client,
            events: events.clone(),
            nft_balances,
            erc20_balances,
            stats,
            metadata_cache,
            chain_reorg: ChainReorgDetector::new(events.clone(), chain_id),
            slot_reorg: SlotReorgDetector::new(events, chain_id),
            cursor,
        }
    }

    /// Dispatch one decoded event to its persister and account for the
    /// outcome. Order-dependent kinds (`BatchProposed`, `Proposed`) must
    /// be dispatched sequentially in emission order by the caller.
    pub async fn persist_event(&self, ev: &SourcedEvent) -> Result<Persisted, IndexerError> {
        let kind = ev.payload.kind();
        let result = match &ev.payload {
            ChainEvent::BlockProposed(data) => self.persist_block_proposed(&ev.meta, data).await,
            ChainEvent::BlockProven(data) => self.persist_block_proven(&ev.meta, data).await,
            ChainEvent::BlockVerified(data) => self.persist_block_verified(&ev.meta, data).await,
            ChainEvent::MessageSent(data) => self.persist_message_sent(&ev.meta, data).await,
            ChainEvent::BatchProposed(data) => self.persist_batch_proposed(&ev.meta, data).await,
            ChainEvent::BatchesProved(data) => self.persist_batches_proved(&ev.meta, data).await,
            ChainEvent::BatchesVerified(data) => {
                self.persist_batches_verified(&ev.meta, data).await
            }
            ChainEvent::Proposed(data) => self.persist_proposed(&ev.meta, data).await,
            ChainEvent::Proved(data) => self.persist_proved(&ev.meta, data).await,
        };

        match &result {
            Ok(Persisted::Saved) => metrics::record_processed(kind),
            Ok(Persisted::Skipped) => {}
            Err(e) => {
                metrics::record_error(kind);
                tracing::error!(
                    chain_id = self.chain_id,
                    kind = %kind,
                    block = ev.meta.block_id,
                    error = %e,
                    "event persist failed"
                );
            }
        }
        result
    }

    /// Timestamp of `block`, resolved through the chain client.
    pub(crate) async fn block_timestamp(
        &self,
        block: u64,
    ) -> Result<DateTime<Utc>, IndexerError> {
        let header = self.client.header_by_number(block).await?;
        DateTime::from_timestamp(header.timestamp, 0)
            .ok_or_else(|| IndexerError::Other(format!("invalid block timestamp: {}", header.timestamp)))
    }

    /// Chain-level reorg check; resets the shared cursor to the
    /// divergence point when a rollback happened.
    pub(crate) async fn guard_chain_reorg(
        &self,
        kind: eventindex_core::types::EventKind,
        incoming_block: u64,
    ) -> Result<(), IndexerError> {
        if let Some(outcome) = self.chain_reorg.check_and_rollback(kind, incoming_block).await? {
            let target = outcome.rolled_back_from.saturating_sub(1);
            let mut cursor = self.cursor.lock().unwrap();
            if target < cursor.latest() {
                cursor.rollback(target);
            }
        }
        Ok(())
    }

    /// Fold one sample into a running stat (read-modify-write, best
    /// effort).
    pub(crate) async fn update_stat(
        &self,
        kind: StatKind,
        sample: u128,
    ) -> Result<(), IndexerError> {
        let mut stat = self
            .stats
            .find(self.chain_id, kind)
            .await?
            .unwrap_or_else(|| Stat::empty(self.chain_id, kind));
        stat.fold(sample);
        self.stats.save(stat).await
    }
}
