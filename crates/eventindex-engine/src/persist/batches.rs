//! Persisters for the Pacaya batch-lifecycle events.

use eventindex_core::error::IndexerError;
use eventindex_core::era::ForkEra;
use eventindex_core::repo::EventRepository;
use eventindex_core::stat::StatKind;
use eventindex_core::types::{EventKind, NewEvent};

use crate::events::{BatchProposedData, BatchesProvedData, BatchesVerifiedData, LogMeta};
use crate::persist::{Persisted, Persisters};

impl Persisters {
    /// Persist a `BatchProposed` event.
    ///
    /// Must be invoked strictly in emission order: the batch's first
    /// block id is derived from the previous persisted batch's last
    /// block id, which is not re-emitted on-chain per event.
    pub(crate) async fn persist_batch_proposed(
        &self,
        meta: &LogMeta,
        data: &BatchProposedData,
    ) -> Result<Persisted, IndexerError> {
        self.guard_chain_reorg(EventKind::BatchProposed, meta.block_id).await?;
        self.slot_reorg
            .supersede_batch(EventKind::BatchProposed, data.batch_id)
            .await?;

        let first_block_id = self
            .previous_last_block(EventKind::BatchProposed, ForkEra::Pacaya)
            .await?;
        let transacted_at = self.block_timestamp(meta.block_id).await?;

        let mut event = NewEvent::new(
            EventKind::BatchProposed,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "batchId": data.batch_id,
                "firstBlockId": first_block_id,
                "lastBlockId": data.last_block_id,
                "proposer": data.proposer,
            }),
        );
        event.batch_id = Some(data.batch_id);
        event.related_block_id = Some(data.last_block_id);
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;
        tracing::debug!(
            chain_id = self.chain_id,
            batch_id = data.batch_id,
            first_block_id,
            last_block_id = data.last_block_id,
            "batch proposed"
        );
        Ok(Persisted::Saved)
    }

    /// Persist a `BatchesProved` event: one record per covered batch id,
    /// inside a single call.
    pub(crate) async fn persist_batches_proved(
        &self,
        meta: &LogMeta,
        data: &BatchesProvedData,
    ) -> Result<Persisted, IndexerError> {
        if data.batch_ids.is_empty() {
            return Ok(Persisted::Skipped);
        }

        let transacted_at = self.block_timestamp(meta.block_id).await?;

        for &batch_id in &data.batch_ids {
            self.slot_reorg
                .supersede_batch(EventKind::BatchesProved, batch_id)
                .await?;

            let mut event = NewEvent::new(
                EventKind::BatchesProved,
                self.chain_id,
                meta.block_id,
                &meta.address,
                serde_json::json!({
                    "batchId": batch_id,
                    "prover": data.prover,
                }),
            );
            event.batch_id = Some(batch_id);
            event.assigned_prover = Some(data.prover.clone());
            event.transacted_at = Some(transacted_at);
            self.events.save(event).await?;

            let proposed = self
                .events
                .find_by_kind_and_batch_id(self.chain_id, EventKind::BatchProposed, batch_id)
                .await?;
            if let Some(proposed_at) = proposed.and_then(|p| p.event.transacted_at) {
                let elapsed = (transacted_at - proposed_at).num_seconds();
                if elapsed >= 0 {
                    self.update_stat(StatKind::ProofTime, elapsed as u128).await?;
                }
            }
        }

        Ok(Persisted::Saved)
    }

    pub(crate) async fn persist_batches_verified(
        &self,
        meta: &LogMeta,
        data: &BatchesVerifiedData,
    ) -> Result<Persisted, IndexerError> {
        self.slot_reorg
            .supersede_batch(EventKind::BatchesVerified, data.batch_id)
            .await?;

        let transacted_at = self.block_timestamp(meta.block_id).await?;

        let mut event = NewEvent::new(
            EventKind::BatchesVerified,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "batchId": data.batch_id,
                "prover": data.prover,
                "proverReward": data.prover_reward,
            }),
        );
        event.batch_id = Some(data.batch_id);
        event.assigned_prover = Some(data.prover.clone());
        event.amount = Some(data.prover_reward.clone());
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;

        if let Ok(reward) = data.prover_reward.parse::<u128>() {
            self.update_stat(StatKind::ProofReward, reward).await?;
        }

        Ok(Persisted::Saved)
    }

    /// First block id of the next batch/proposal: the previous persisted
    /// record's last block id plus one, seeded from the era activation
    /// height when no previous record exists.
    pub(crate) async fn previous_last_block(
        &self,
        kind: EventKind,
        era: ForkEra,
    ) -> Result<u64, IndexerError> {
        match self.events.find_latest_by_kind(self.chain_id, kind).await? {
            Some(prev) => Ok(prev.event.related_block_id.map(|last| last + 1).unwrap_or(0)),
            None => Ok(self.config.fork.activation_height(era).unwrap_or(0)),
        }
    }
}
