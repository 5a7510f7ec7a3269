//! Persisters for the Shasta proposal/proof events.

use eventindex_core::error::IndexerError;
use eventindex_core::era::ForkEra;
use eventindex_core::repo::EventRepository;
use eventindex_core::stat::StatKind;
use eventindex_core::types::{EventKind, NewEvent};

use crate::events::{LogMeta, ProposedData, ProvedData};
use crate::persist::{Persisted, Persisters};

impl Persisters {
    /// Persist a Shasta `Proposed` event. Same ordering constraint as
    /// the Pacaya batch persister: strictly in emission order.
    pub(crate) async fn persist_proposed(
        &self,
        meta: &LogMeta,
        data: &ProposedData,
    ) -> Result<Persisted, IndexerError> {
        self.guard_chain_reorg(EventKind::Proposed, meta.block_id).await?;
        self.slot_reorg
            .supersede_batch(EventKind::Proposed, data.proposal_id)
            .await?;

        let first_block_id = self
            .previous_last_block(EventKind::Proposed, ForkEra::Shasta)
            .await?;
        let transacted_at = self.block_timestamp(meta.block_id).await?;

        let mut event = NewEvent::new(
            EventKind::Proposed,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "proposalId": data.proposal_id,
                "firstBlockId": first_block_id,
                "lastBlockId": data.last_block_id,
                "proposer": data.proposer,
            }),
        );
        event.batch_id = Some(data.proposal_id);
        event.related_block_id = Some(data.last_block_id);
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;
        Ok(Persisted::Saved)
    }

    /// Persist a Shasta `Proved` event: one record per proposal id in
    /// the covered span.
    pub(crate) async fn persist_proved(
        &self,
        meta: &LogMeta,
        data: &ProvedData,
    ) -> Result<Persisted, IndexerError> {
        if data.last_proposal_id < data.first_proposal_id {
            // Malformed span; not an error.
            return Ok(Persisted::Skipped);
        }

        let transacted_at = self.block_timestamp(meta.block_id).await?;

        for proposal_id in data.first_proposal_id..=data.last_proposal_id {
            self.slot_reorg
                .supersede_batch(EventKind::Proved, proposal_id)
                .await?;

            let mut event = NewEvent::new(
                EventKind::Proved,
                self.chain_id,
                meta.block_id,
                &meta.address,
                serde_json::json!({
                    "proposalId": proposal_id,
                    "prover": data.prover,
                }),
            );
            event.batch_id = Some(proposal_id);
            event.assigned_prover = Some(data.prover.clone());
            event.transacted_at = Some(transacted_at);
            self.events.save(event).await?;

            let proposed = self
                .events
                .find_by_kind_and_batch_id(self.chain_id, EventKind::Proposed, proposal_id)
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
}
