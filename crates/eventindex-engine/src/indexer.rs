//! The top-level indexer — wires the sync-mode controller, batch range
//! scanner, and live subscriber together.
//!
//! # Phase 1: BACKFILL
//! The sync-mode controller seeds the cursor, the fork schedule picks
//! the filter strategy, and the scanner catches up to the chain head in
//! batch windows (retrying failed windows).
//!
//! # Phase 2: LIVE
//! The live subscriber takes over incremental ingestion via push
//! subscriptions, with the scanner ticking alongside as a safety net
//! for anything the subscriptions miss.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use eventindex_core::cache::TokenMetadataCache;
use eventindex_core::cursor::IndexingCursor;
use eventindex_core::error::IndexerError;
use eventindex_core::indexer::{IndexerConfig, IndexerState};
use eventindex_core::repo::{
    BlockRepository, Erc20BalanceRepository, EventRepository, NftBalanceRepository, StatRepository,
};

use crate::chain::ChainClient;
use crate::events::EventSource;
use crate::persist::Persisters;
use crate::scanner::BatchRangeScanner;
use crate::strategy::FilterStrategy;
use crate::subscriber::LiveSubscriber;
use crate::sync;

/// Everything the indexer consumes from the outside: the RPC facade,
/// the decoded event stream, and the repositories.
pub struct IndexerContext {
    pub client: Arc<dyn ChainClient>,
    pub source: Arc<dyn EventSource>,
    pub events: Arc<dyn EventRepository>,
    pub nft_balances: Arc<dyn NftBalanceRepository>,
    pub erc20_balances: Arc<dyn Erc20BalanceRepository>,
    pub blocks: Arc<dyn BlockRepository>,
    pub stats: Arc<dyn StatRepository>,
    pub metadata_cache: TokenMetadataCache,
}

pub struct EventIndexer {
    config: IndexerConfig,
    chain_id: u64,
    client: Arc<dyn ChainClient>,
    source: Arc<dyn EventSource>,
    events: Arc<dyn EventRepository>,
    blocks: Arc<dyn BlockRepository>,
    persisters: Arc<Persisters>,
    cursor: Arc<Mutex<IndexingCursor>>,
    state: Arc<Mutex<IndexerState>>,
}

impl std::fmt::Debug for EventIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIndexer")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl EventIndexer {
    /// Validate the configuration and resolve the chain id. Fails fast
    /// on invalid configuration; no scanning starts here.
    pub async fn new(config: IndexerConfig, ctx: IndexerContext) -> Result<Self, IndexerError> {
        if config.batch_size == 0 {
            return Err(IndexerError::Other("batch size must be positive".into()));
        }

        let chain_id = ctx.client.chain_id().await?;
        let cursor = Arc::new(Mutex::new(IndexingCursor::new(chain_id, 0)));
        let persisters = Arc::new(Persisters::new(
            chain_id,
            config.clone(),
            ctx.client.clone(),
            ctx.events.clone(),
            ctx.nft_balances,
            ctx.erc20_balances,
            ctx.stats,
            ctx.metadata_cache,
            cursor.clone(),
        ));

        Ok(Self {
            config,
            chain_id,
            client: ctx.client,
            source: ctx.source,
            events: ctx.events,
            blocks: ctx.blocks,
            persisters,
            cursor,
            state: Arc::new(Mutex::new(IndexerState::Idle)),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn state(&self) -> IndexerState {
        *self.state.lock().unwrap()
    }

    /// The highest fully indexed block, for observability.
    pub fn latest_indexed(&self) -> u64 {
        self.cursor.lock().unwrap().latest()
    }

    fn set_state(&self, state: IndexerState) {
        *self.state.lock().unwrap() = state;
        tracing::info!(chain_id = self.chain_id, %state, "indexer state changed");
    }

    /// Run until cancellation or a non-retryable error.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), IndexerError> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        let start_block = sync::starting_block(
            &self.events,
            self.chain_id,
            self.config.sync_mode,
            self.config.genesis_height,
        )
        .await?;
        *self.cursor.lock().unwrap() = IndexingCursor::new(self.chain_id, start_block);

        let strategy = FilterStrategy::from(self.config.fork.era_at(start_block + 1));
        tracing::info!(
            chain_id = self.chain_id,
            start_block,
            %strategy,
            batch_size = self.config.batch_size,
            "starting indexer"
        );

        let scanner = BatchRangeScanner::new(
            self.client.clone(),
            self.source.clone(),
            strategy,
            self.persisters.clone(),
            self.cursor.clone(),
            self.config.batch_size,
            poll_interval,
        );

        // Phase 1: backfill. Failed windows are retried on the poll
        // cadence without advancing the cursor.
        self.set_state(IndexerState::Backfilling);
        loop {
            match scanner.catch_up(&cancel).await {
                Ok(()) => break,
                Err(e) if e.is_cancelled() => {
                    self.set_state(IndexerState::Stopped);
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(error = %e, "backfill window failed, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.set_state(IndexerState::Stopped);
                            return Ok(());
                        }
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Err(e) => {
                    self.set_state(IndexerState::Error);
                    return Err(e);
                }
            }
        }

        // Phase 2: live. The subscriber owns incremental ingestion; the
        // scanner keeps ticking as a safety net.
        self.set_state(IndexerState::Live);
        let subscriber = Arc::new(LiveSubscriber::new(
            self.chain_id,
            self.client.clone(),
            self.source.clone(),
            self.persisters.clone(),
            self.blocks.clone(),
            strategy.subscription_kinds(),
            Duration::from_millis(self.config.subscription_backoff_ms),
            self.config.index_nfts || self.config.index_erc20,
        ));

        let result = tokio::select! {
            res = scanner.run(&cancel) => res,
            res = subscriber.run(cancel.clone()) => res,
        };
        match result {
            Ok(()) => {
                self.set_state(IndexerState::Stopped);
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                self.set_state(IndexerState::Stopped);
                Ok(())
            }
            Err(e) => {
                self.set_state(IndexerState::Error);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block_proposed_event, TestHarness};
    use eventindex_core::types::EventKind;

    #[tokio::test]
    async fn rejects_zero_batch_size() {
        let h = TestHarness::new().await;
        let config = IndexerConfig { batch_size: 0, ..Default::default() };
        let err = EventIndexer::new(config, h.context()).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn backfills_then_goes_live_and_stops_on_cancel() {
        let h = TestHarness::builder().head(25).batch_size(10).build().await;
        h.source.push_event(block_proposed_event(5, 5));
        h.source.push_event(block_proposed_event(17, 17));

        let config = IndexerConfig {
            batch_size: 10,
            poll_interval_ms: 20,
            subscription_backoff_ms: 10,
            ..Default::default()
        };
        let indexer = Arc::new(EventIndexer::new(config, h.context()).await.unwrap());
        assert_eq!(indexer.state(), IndexerState::Idle);

        let cancel = CancellationToken::new();
        let runner = {
            let indexer = indexer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { indexer.start(cancel).await })
        };

        // Wait for the backfill to finish and the live phase to begin.
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while indexer.state() != IndexerState::Live {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("indexer never reached live state");

        assert_eq!(indexer.latest_indexed(), 25);
        assert_eq!(h.storage.events_of_kind(1, EventKind::BlockProposed).len(), 2);

        cancel.cancel();
        runner.await.unwrap().unwrap();
        assert_eq!(indexer.state(), IndexerState::Stopped);
    }
}
