//! Batch range scanner — advances the cursor one window at a time.
//!
//! Each iteration reads the chain head, computes
//! `end = min(cursor + batch_size, head)`, invokes the active filter
//! strategy over `[cursor + 1, end]`, and only then advances the cursor
//! to `end`. A failing window leaves the cursor untouched, so the next
//! attempt re-scans the identical window — the reorg detectors inside
//! the persisters make that retry idempotent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use eventindex_core::cursor::IndexingCursor;
use eventindex_core::error::IndexerError;

use crate::chain::ChainClient;
use crate::events::EventSource;
use crate::persist::Persisters;
use crate::strategy::FilterStrategy;

pub struct BatchRangeScanner {
    client: Arc<dyn ChainClient>,
    source: Arc<dyn EventSource>,
    strategy: FilterStrategy,
    persisters: Arc<Persisters>,
    cursor: Arc<Mutex<IndexingCursor>>,
    batch_size: u64,
    poll_interval: Duration,
}

impl BatchRangeScanner {
    pub fn new(
        client: Arc<dyn ChainClient>,
        source: Arc<dyn EventSource>,
        strategy: FilterStrategy,
        persisters: Arc<Persisters>,
        cursor: Arc<Mutex<IndexingCursor>>,
        batch_size: u64,
        poll_interval: Duration,
    ) -> Self {
        Self { client, source, strategy, persisters, cursor, batch_size, poll_interval }
    }

    /// Scan windows until the cursor reaches the chain head, then yield.
    /// The first failing window aborts the call without advancing the
    /// cursor.
    pub async fn catch_up(&self, cancel: &CancellationToken) -> Result<(), IndexerError> {
        loop {
            if cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }

            let head = self.client.head_number().await?;
            let current = self.cursor.lock().unwrap().latest();
            if current >= head {
                return Ok(());
            }

            let start = current + 1;
            let end = (current + self.batch_size).min(head);
            self.strategy
                .index_range(&self.persisters, &self.source, start, end, cancel)
                .await?;

            let mut cursor = self.cursor.lock().unwrap();
            if cursor.latest() < current {
                // A chain reorg rolled the cursor back mid-window; keep
                // it at the divergence point so the next iteration
                // re-scans from there.
                tracing::info!(
                    chain_id = cursor.chain_id(),
                    cursor = cursor.latest(),
                    window_start = start,
                    "window hit a reorg rollback, rescanning from divergence point"
                );
            } else {
                cursor.advance(end);
            }
            tracing::info!(
                chain_id = cursor.chain_id(),
                window_start = start,
                window_end = end,
                head,
                "batch window indexed"
            );
        }
    }

    /// Steady-state loop: tick every `poll_interval` and catch up to
    /// whatever new head exists. Retryable failures are logged and left
    /// for the next tick; the same window is re-scanned. Returns on
    /// cancellation or a non-retryable error.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), IndexerError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            match self.catch_up(cancel).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Ok(()),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(error = %e, "scan tick failed, window will be retried");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
