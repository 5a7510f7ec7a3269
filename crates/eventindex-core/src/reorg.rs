//! Reorg detection — notice stale chain history and delete superseded
//! records before a new write proceeds.
//!
//! Two variants exist, used by different event families:
//!
//! - [`ChainReorgDetector`] guards the overall chain cursor: a new log
//!   emitted at a block number at or below the highest one already
//!   persisted *for its kind* means that history was rewritten, so
//!   everything from the incoming block upward is dropped, across all
//!   kinds. The comparison is per-kind (each extractor iterates its own
//!   events in ascending order, so its own history is a valid
//!   reference); the deletion is chain-wide, because a reorg invalidates
//!   every kind's records above the divergence point.
//! - [`SlotReorgDetector`] guards block- or batch-keyed lifecycle
//!   events: a record already existing for the same logical slot means
//!   the chain diverged and produced a different event for it, so the
//!   stale record is deleted before the new insert.
//!
//! Both are best-effort: they compare existence and height, never
//! payloads. A reorg is a data condition, logged and repaired — not an
//! error. Query or delete failures do propagate as hard errors and
//! abort the current batch window.

use std::sync::Arc;

use crate::error::IndexerError;
use crate::repo::EventRepository;
use crate::types::EventKind;

/// Result of a chain-level rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorgOutcome {
    /// The block the rollback started from (inclusive).
    pub rolled_back_from: u64,
    /// Number of records deleted.
    pub deleted: u64,
}

/// Chain-cursor style detector.
pub struct ChainReorgDetector {
    events: Arc<dyn EventRepository>,
    chain_id: u64,
}

impl ChainReorgDetector {
    pub fn new(events: Arc<dyn EventRepository>, chain_id: u64) -> Self {
        Self { events, chain_id }
    }

    /// Compare `incoming_block` against the highest emitting block
    /// persisted for `kind`. If the persisted value is `>=` the incoming
    /// one, delete every record of the chain from `incoming_block`
    /// upward (all kinds) and report the rollback; otherwise do nothing.
    pub async fn check_and_rollback(
        &self,
        kind: EventKind,
        incoming_block: u64,
    ) -> Result<Option<ReorgOutcome>, IndexerError> {
        let latest = self
            .events
            .find_latest_block_id_by_kind(self.chain_id, kind)
            .await?;
        if latest == 0 || latest < incoming_block {
            return Ok(None);
        }

        let deleted = self
            .events
            .delete_all_after_block_id(self.chain_id, incoming_block)
            .await?;
        tracing::warn!(
            chain_id = self.chain_id,
            kind = %kind,
            latest_indexed = latest,
            incoming_block,
            deleted,
            "reorg detected, superseded records removed"
        );
        Ok(Some(ReorgOutcome { rolled_back_from: incoming_block, deleted }))
    }
}

/// Per-event-kind slot detector.
pub struct SlotReorgDetector {
    events: Arc<dyn EventRepository>,
    chain_id: u64,
}

impl SlotReorgDetector {
    pub fn new(events: Arc<dyn EventRepository>, chain_id: u64) -> Self {
        Self { events, chain_id }
    }

    /// Delete the existing record of `kind` for subject block
    /// `block_id`, if any. Returns `true` when a stale record was
    /// removed.
    pub async fn supersede_block(
        &self,
        kind: EventKind,
        block_id: u64,
    ) -> Result<bool, IndexerError> {
        let existing = self
            .events
            .find_by_kind_and_block_id(self.chain_id, kind, block_id)
            .await?;
        self.delete_if_present(kind, existing, block_id).await
    }

    /// Delete the existing record of `kind` for `batch_id`, if any.
    pub async fn supersede_batch(
        &self,
        kind: EventKind,
        batch_id: u64,
    ) -> Result<bool, IndexerError> {
        let existing = self
            .events
            .find_by_kind_and_batch_id(self.chain_id, kind, batch_id)
            .await?;
        self.delete_if_present(kind, existing, batch_id).await
    }

    async fn delete_if_present(
        &self,
        kind: EventKind,
        existing: Option<crate::types::StoredEvent>,
        slot: u64,
    ) -> Result<bool, IndexerError> {
        match existing {
            Some(stale) => {
                tracing::warn!(
                    chain_id = self.chain_id,
                    kind = %kind,
                    slot,
                    stale_id = stale.id,
                    "slot already recorded, replacing after reorg"
                );
                self.events.delete(stale.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
