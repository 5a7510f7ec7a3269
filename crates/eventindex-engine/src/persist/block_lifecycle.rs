//! Persisters for the legacy L1 block-lifecycle events.

use eventindex_core::error::IndexerError;
use eventindex_core::repo::EventRepository;
use eventindex_core::stat::StatKind;
use eventindex_core::types::{EventKind, NewEvent};

use crate::chain::ChainClient;
use crate::events::{BlockProposedData, BlockProvenData, BlockVerifiedData, LogMeta};
use crate::persist::{Persisted, Persisters};

impl Persisters {
    pub(crate) async fn persist_block_proposed(
        &self,
        meta: &LogMeta,
        data: &BlockProposedData,
    ) -> Result<Persisted, IndexerError> {
        self.guard_chain_reorg(EventKind::BlockProposed, meta.block_id).await?;
        self.slot_reorg
            .supersede_block(EventKind::BlockProposed, data.block_id)
            .await?;

        let transacted_at = self.block_timestamp(meta.block_id).await?;
        let proposer = self.client.transaction_sender(&meta.tx_hash).await?;

        let mut event = NewEvent::new(
            EventKind::BlockProposed,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "blockId": data.block_id,
                "proposer": proposer,
                "assignedProver": data.assigned_prover,
                "livenessBond": data.liveness_bond,
            }),
        );
        event.related_block_id = Some(data.block_id);
        event.assigned_prover = Some(data.assigned_prover.clone());
        event.amount = Some(data.liveness_bond.clone());
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;
        tracing::debug!(
            chain_id = self.chain_id,
            block_id = data.block_id,
            emitted = meta.block_id,
            "block proposed"
        );
        Ok(Persisted::Saved)
    }

    pub(crate) async fn persist_block_proven(
        &self,
        meta: &LogMeta,
        data: &BlockProvenData,
    ) -> Result<Persisted, IndexerError> {
        self.slot_reorg
            .supersede_block(EventKind::BlockProven, data.block_id)
            .await?;

        let transacted_at = self.block_timestamp(meta.block_id).await?;

        let mut event = NewEvent::new(
            EventKind::BlockProven,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "blockId": data.block_id,
                "prover": data.prover,
                "tier": data.tier,
            }),
        );
        event.related_block_id = Some(data.block_id);
        event.assigned_prover = Some(data.prover.clone());
        event.tier = Some(data.tier);
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;

        // Proof time is the distance between the proposal and its proof.
        // Skipped when the proposal predates what we have indexed.
        let proposed = self
            .events
            .find_by_kind_and_block_id(self.chain_id, EventKind::BlockProposed, data.block_id)
            .await?;
        if let Some(proposed_at) = proposed.and_then(|p| p.event.transacted_at) {
            let elapsed = (transacted_at - proposed_at).num_seconds();
            if elapsed >= 0 {
                self.update_stat(StatKind::ProofTime, elapsed as u128).await?;
            }
        }

        Ok(Persisted::Saved)
    }

    pub(crate) async fn persist_block_verified(
        &self,
        meta: &LogMeta,
        data: &BlockVerifiedData,
    ) -> Result<Persisted, IndexerError> {
        self.slot_reorg
            .supersede_block(EventKind::BlockVerified, data.block_id)
            .await?;

        let transacted_at = self.block_timestamp(meta.block_id).await?;

        let mut event = NewEvent::new(
            EventKind::BlockVerified,
            self.chain_id,
            meta.block_id,
            &meta.address,
            serde_json::json!({
                "blockId": data.block_id,
                "prover": data.prover,
                "proverReward": data.prover_reward,
            }),
        );
        event.related_block_id = Some(data.block_id);
        event.assigned_prover = Some(data.prover.clone());
        event.amount = Some(data.prover_reward.clone());
        event.transacted_at = Some(transacted_at);

        self.events.save(event).await?;

        if let Ok(reward) = data.prover_reward.parse::<u128>() {
            self.update_stat(StatKind::ProofReward, reward).await?;
        }

        Ok(Persisted::Saved)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{
        block_proposed_event, block_proven_event, block_verified_event, TestHarness,
    };
    use eventindex_core::stat::StatKind;
    use eventindex_core::types::EventKind;

    #[tokio::test]
    async fn proposed_record_resolves_sender_and_timestamp() {
        let h = TestHarness::new().await;
        h.persisters.persist_event(&block_proposed_event(7, 7)).await.unwrap();

        let records = h.storage.events_of_kind(1, EventKind::BlockProposed);
        assert_eq!(records.len(), 1);
        let event = &records[0].event;
        assert_eq!(event.related_block_id, Some(7));
        assert!(event.transacted_at.is_some());
        // Proposer resolved through the transaction-sender boundary.
        assert_eq!(
            event.data["proposer"],
            "0x5e4de6b5e6b5e6b5e6b5e6b5e6b5e6b5e6b5e6b5"
        );
    }

    #[tokio::test]
    async fn proof_time_stat_measures_proposal_to_proof() {
        let h = TestHarness::new().await;
        // Proposed at block 10, proven at block 15 — 5 blocks at 12s.
        h.persisters.persist_event(&block_proposed_event(7, 10)).await.unwrap();
        h.persisters.persist_event(&block_proven_event(7, 15)).await.unwrap();

        let stat = h.storage.stat(1, StatKind::ProofTime).unwrap();
        assert_eq!(stat.average, "60");
        assert_eq!(stat.count, 1);
    }

    #[tokio::test]
    async fn proof_time_skipped_when_proposal_unknown() {
        let h = TestHarness::new().await;
        h.persisters.persist_event(&block_proven_event(7, 15)).await.unwrap();

        assert!(h.storage.stat(1, StatKind::ProofTime).is_none());
        assert_eq!(h.storage.events_of_kind(1, EventKind::BlockProven).len(), 1);
    }

    #[tokio::test]
    async fn verified_updates_reward_stat() {
        let h = TestHarness::new().await;
        h.persisters
            .persist_event(&block_verified_event(7, 20, "1000"))
            .await
            .unwrap();
        h.persisters
            .persist_event(&block_verified_event(8, 21, "3000"))
            .await
            .unwrap();

        let stat = h.storage.stat(1, StatKind::ProofReward).unwrap();
        assert_eq!(stat.average, "2000");
        assert_eq!(stat.count, 2);
    }

    #[tokio::test]
    async fn reproven_block_replaces_the_stale_slot() {
        let h = TestHarness::new().await;
        h.persisters.persist_event(&block_proven_event(7, 15)).await.unwrap();
        h.persisters.persist_event(&block_proven_event(7, 16)).await.unwrap();

        // One record per logical slot, the later one wins.
        let records = h.storage.events_of_kind(1, EventKind::BlockProven);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event.block_id, 16);
    }
}
