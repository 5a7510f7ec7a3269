//! Fork-era filter strategies.
//!
//! A strategy is a pure dispatcher over a fixed block range: it fans out
//! one task per independent event kind, joins on all of them, and
//! propagates the first error while cancelling siblings. Order-dependent
//! kinds (`BatchProposed` in Pacaya, `Proposed` in Shasta) are *not*
//! dispatched into the concurrent group — they are persisted on the
//! calling path, strictly in emission order, because each record derives
//! its first-block id from the immediately preceding persisted record.
//!
//! All three strategies share the raw-block token-transfer sub-step.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use eventindex_core::era::ForkEra;
use eventindex_core::error::IndexerError;
use eventindex_core::types::EventKind;

use crate::events::EventSource;
use crate::persist::Persisters;

/// The three interchangeable extraction programs, selected once per
/// deployment from the fork schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Legacy L1 block-lifecycle events.
    LegacyL1,
    /// Pacaya batch-lifecycle events.
    Pacaya,
    /// Shasta proposal/proof events.
    Shasta,
}

impl From<ForkEra> for FilterStrategy {
    fn from(era: ForkEra) -> Self {
        match era {
            ForkEra::LegacyL1 => Self::LegacyL1,
            ForkEra::Pacaya => Self::Pacaya,
            ForkEra::Shasta => Self::Shasta,
        }
    }
}

impl std::fmt::Display for FilterStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyL1 => write!(f, "legacy-l1"),
            Self::Pacaya => write!(f, "pacaya"),
            Self::Shasta => write!(f, "shasta"),
        }
    }
}

impl FilterStrategy {
    /// Kinds that must be persisted sequentially on the calling path.
    pub fn ordered_kinds(&self) -> &'static [EventKind] {
        match self {
            Self::LegacyL1 => &[],
            Self::Pacaya => &[EventKind::BatchProposed],
            Self::Shasta => &[EventKind::Proposed],
        }
    }

    /// Kinds with no cross-event dependency, safe to extract
    /// concurrently.
    pub fn concurrent_kinds(&self) -> &'static [EventKind] {
        match self {
            Self::LegacyL1 => &[
                EventKind::BlockProposed,
                EventKind::BlockProven,
                EventKind::BlockVerified,
                EventKind::MessageSent,
            ],
            Self::Pacaya => &[
                EventKind::BatchesProved,
                EventKind::BatchesVerified,
                EventKind::MessageSent,
            ],
            Self::Shasta => &[EventKind::Proved, EventKind::MessageSent],
        }
    }

    /// Every kind this strategy extracts — what the live subscriber
    /// subscribes to.
    pub fn subscription_kinds(&self) -> Vec<EventKind> {
        let mut kinds = self.ordered_kinds().to_vec();
        kinds.extend_from_slice(self.concurrent_kinds());
        kinds
    }

    /// Extract and persist every event of this strategy's kinds emitted
    /// in `[from, to]`. Any persister error aborts the whole invocation;
    /// the scanner retries the identical window on its next tick.
    pub async fn index_range(
        &self,
        persisters: &Arc<Persisters>,
        source: &Arc<dyn EventSource>,
        from: u64,
        to: u64,
        cancel: &CancellationToken,
    ) -> Result<(), IndexerError> {
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        let mut tasks: JoinSet<Result<(), IndexerError>> = JoinSet::new();

        for &kind in self.concurrent_kinds() {
            let persisters = persisters.clone();
            let source = source.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(IndexerError::Cancelled),
                    res = index_kind(&persisters, &source, kind, from, to) => res,
                }
            });
        }

        // The transfer sub-step is range-based, not event-kind-based,
        // and independent of everything else.
        {
            let persisters = persisters.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(IndexerError::Cancelled),
                    res = persisters.index_token_transfers(from, to) => res.map(|_| ()),
                }
            });
        }

        // Order-dependent kinds run here, on the calling path.
        let ordered = async {
            for &kind in self.ordered_kinds() {
                index_kind(persisters, source, kind, from, to).await?;
            }
            Ok(())
        };
        let ordered_result = tokio::select! {
            _ = cancel.cancelled() => Err(IndexerError::Cancelled),
            res = ordered => res,
        };
        if let Err(e) = ordered_result {
            tasks.abort_all();
            return Err(e);
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
                        "persister task panicked: {join_err}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fetch and persist all events of one kind for the range, in emission
/// order.
async fn index_kind(
    persisters: &Arc<Persisters>,
    source: &Arc<dyn EventSource>,
    kind: EventKind,
    from: u64,
    to: u64,
) -> Result<(), IndexerError> {
    let events = source.events_in_range(kind, from, to).await?;
    for event in &events {
        persisters.persist_event(event).await?;
    }
    Ok(())
}
