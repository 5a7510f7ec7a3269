//! Live subscriber — push-based ingestion at the chain head.
//!
//! Runs once the batch scanner has caught up. One long-lived task per
//! subscribed event kind, each cycling through
//! `Subscribing → Receiving → (Error → backoff → Resubscribing) → …`
//! until cancelled. Every received item spawns an independent task that
//! invokes the same persister used by the batch path, then raises the
//! per-kind processed-block marker.
//!
//! Range-based sub-indexing (token transfers) is head-triggered: each
//! new head re-runs the transfer sub-step over a one-block range.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use eventindex_core::error::IndexerError;
use eventindex_core::repo::BlockRepository;
use eventindex_core::types::EventKind;

use crate::backoff::SubscribeBackoff;
use crate::chain::ChainClient;
use crate::events::{EventSource, SourcedEvent};
use crate::persist::Persisters;

/// Marker key for the head-triggered transfer sub-indexer.
pub const TRANSFER_MARKER_KIND: &str = "token_transfers";

pub struct LiveSubscriber {
    chain_id: u64,
    client: Arc<dyn ChainClient>,
    source: Arc<dyn EventSource>,
    persisters: Arc<Persisters>,
    blocks: Arc<dyn BlockRepository>,
    kinds: Vec<EventKind>,
    backoff_initial: Duration,
    index_transfers: bool,
}

impl LiveSubscriber {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: u64,
        client: Arc<dyn ChainClient>,
        source: Arc<dyn EventSource>,
        persisters: Arc<Persisters>,
        blocks: Arc<dyn BlockRepository>,
        kinds: Vec<EventKind>,
        backoff_initial: Duration,
        index_transfers: bool,
    ) -> Self {
        Self {
            chain_id,
            client,
            source,
            persisters,
            blocks,
            kinds,
            backoff_initial,
            index_transfers,
        }
    }

    /// Run every subscription until cancellation. The first fatal task
    /// failure cancels the siblings and surfaces to the owner.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), IndexerError> {
        let mut tasks: JoinSet<Result<(), IndexerError>> = JoinSet::new();

        for &kind in &self.kinds {
            let sub = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { sub.subscribe_loop(kind, cancel).await });
        }
        if self.index_transfers {
            let sub = self.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { sub.heads_loop(cancel).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(IndexerError::Other(format!(
                        "subscriber task panicked: {join_err}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// `Subscribing → Receiving → (backoff → Resubscribing)` cycle for
    /// one event kind. Only cancellation ends the loop; subscription
    /// failures back off and retry indefinitely.
    async fn subscribe_loop(
        self: Arc<Self>,
        kind: EventKind,
        cancel: CancellationToken,
    ) -> Result<(), IndexerError> {
        let mut backoff =
            SubscribeBackoff::new(self.backoff_initial, self.backoff_initial.saturating_mul(20));

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.source.subscribe(kind).await {
                Ok(mut rx) => {
                    tracing::info!(chain_id = self.chain_id, kind = %kind, "subscribed");
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => return Ok(()),
                            item = rx.recv() => match item {
                                Some(event) => {
                                    backoff.reset();
                                    let sub = self.clone();
                                    tokio::spawn(async move {
                                        sub.handle_item(kind, event).await;
                                    });
                                }
                                None => {
                                    tracing::warn!(
                                        chain_id = self.chain_id,
                                        kind = %kind,
                                        "subscription closed"
                                    );
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        chain_id = self.chain_id,
                        kind = %kind,
                        error = %e,
                        "subscribe failed"
                    );
                }
            }

            let delay = backoff.next();
            tracing::debug!(kind = %kind, delay_ms = delay.as_millis() as u64, "resubscribing");
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Persist one received event and raise the processed marker.
    /// Failures are logged and counted by the persister; they do not
    /// kill the subscription.
    async fn handle_item(&self, kind: EventKind, event: SourcedEvent) {
        if self.persisters.persist_event(&event).await.is_ok() {
            if let Err(e) = self.raise_marker(kind.as_str(), event.meta.block_id).await {
                tracing::warn!(kind = %kind, error = %e, "marker update failed");
            }
        }
    }

    /// Head-triggered one-block transfer scans.
    async fn heads_loop(self: Arc<Self>, cancel: CancellationToken) -> Result<(), IndexerError> {
        let mut backoff =
            SubscribeBackoff::new(self.backoff_initial, self.backoff_initial.saturating_mul(20));

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.client.subscribe_heads().await {
                Ok(mut rx) => {
                    tracing::info!(chain_id = self.chain_id, "subscribed to new heads");
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => return Ok(()),
                            head = rx.recv() => match head {
                                Some(header) => {
                                    backoff.reset();
                                    let sub = self.clone();
                                    tokio::spawn(async move {
                                        let number = header.number;
                                        match sub.persisters.index_token_transfers(number, number).await {
                                            Ok(_) => {
                                                if let Err(e) = sub
                                                    .raise_marker(TRANSFER_MARKER_KIND, number)
                                                    .await
                                                {
                                                    tracing::warn!(error = %e, "marker update failed");
                                                }
                                            }
                                            Err(e) => tracing::error!(
                                                block = number,
                                                error = %e,
                                                "transfer scan failed"
                                            ),
                                        }
                                    });
                                }
                                None => {
                                    tracing::warn!(chain_id = self.chain_id, "head subscription closed");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(chain_id = self.chain_id, error = %e, "head subscribe failed");
                }
            }

            let delay = backoff.next();
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Monotonic marker update: only raised when the new height exceeds
    /// the stored one.
    async fn raise_marker(&self, kind: &str, height: u64) -> Result<(), IndexerError> {
        let current = self.blocks.get_latest_block_processed(self.chain_id, kind).await?;
        if height > current {
            self.blocks.save(self.chain_id, kind, height).await?;
        }
        Ok(())
    }
}
