//! Decoded event stream boundary.
//!
//! The generated contract bindings (rollup inbox, batch inbox, proposal
//! inbox, bridge) live outside this crate; what the engine sees is a
//! finite, already-decoded, ascending-order sequence of events per
//! queried range, plus a push subscription per kind. [`ChainEvent`]
//! carries the decoded payload, [`LogMeta`] the raw log coordinates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use eventindex_core::error::IndexerError;
use eventindex_core::types::EventKind;

// ─── Decoded payloads ────────────────────────────────────────────────────────

/// Legacy block-lifecycle: a rollup block was proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockProposedData {
    /// The proposed rollup block id (the event's subject).
    pub block_id: u64,
    pub assigned_prover: String,
    /// Liveness bond staked by the assigned prover, in wei.
    pub liveness_bond: String,
}

/// Legacy block-lifecycle: a proof was submitted for a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockProvenData {
    pub block_id: u64,
    pub prover: String,
    pub tier: u16,
}

/// Legacy block-lifecycle: a proven block was verified on L1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockVerifiedData {
    pub block_id: u64,
    pub prover: String,
    /// Reward paid to the prover, in wei.
    pub prover_reward: String,
}

/// Bridge: a cross-chain message left the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSentData {
    pub msg_hash: String,
    pub from: String,
    pub to: String,
    /// Message value in wei, decimal string.
    pub value: String,
}

/// Pacaya: a batch of blocks was proposed.
///
/// The batch's *first* block id is not re-emitted on-chain; it is
/// derived from the previous batch's last block id, which is why these
/// events must be persisted strictly in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProposedData {
    pub batch_id: u64,
    pub last_block_id: u64,
    pub proposer: String,
}

/// Pacaya: one proof covering several batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchesProvedData {
    pub batch_ids: Vec<u64>,
    pub prover: String,
}

/// Pacaya: batches verified up to `batch_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchesVerifiedData {
    pub batch_id: u64,
    pub prover: String,
    pub prover_reward: String,
}

/// Shasta: a proposal was submitted. Same ordering constraint as
/// [`BatchProposedData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedData {
    pub proposal_id: u64,
    pub last_block_id: u64,
    pub proposer: String,
}

/// Shasta: one proof covering a span of proposal ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvedData {
    pub first_proposal_id: u64,
    pub last_proposal_id: u64,
    pub prover: String,
}

/// A decoded protocol event, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainEvent {
    BlockProposed(BlockProposedData),
    BlockProven(BlockProvenData),
    BlockVerified(BlockVerifiedData),
    MessageSent(MessageSentData),
    BatchProposed(BatchProposedData),
    BatchesProved(BatchesProvedData),
    BatchesVerified(BatchesVerifiedData),
    Proposed(ProposedData),
    Proved(ProvedData),
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BlockProposed(_) => EventKind::BlockProposed,
            Self::BlockProven(_) => EventKind::BlockProven,
            Self::BlockVerified(_) => EventKind::BlockVerified,
            Self::MessageSent(_) => EventKind::MessageSent,
            Self::BatchProposed(_) => EventKind::BatchProposed,
            Self::BatchesProved(_) => EventKind::BatchesProved,
            Self::BatchesVerified(_) => EventKind::BatchesVerified,
            Self::Proposed(_) => EventKind::Proposed,
            Self::Proved(_) => EventKind::Proved,
        }
    }
}

// ─── Log coordinates / sourced events ────────────────────────────────────────

/// Where a decoded event came from on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMeta {
    /// Block the log was emitted in.
    pub block_id: u64,
    pub tx_hash: String,
    pub log_index: u32,
    /// Emitting contract address.
    pub address: String,
}

/// A decoded event together with its log coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedEvent {
    pub meta: LogMeta,
    pub payload: ChainEvent,
}

// ─── EventSource ─────────────────────────────────────────────────────────────

/// The decoded event stream produced by the external bindings layer.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// All events of `kind` emitted in `[from, to]`, ascending by
    /// emission order (block number, then log index). The sequence is
    /// finite and fully materialized; it is not restartable.
    async fn events_in_range(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<SourcedEvent>, IndexerError>;

    /// Push subscription for `kind`. The channel closing means the
    /// subscription dropped; callers apply backoff and resubscribe.
    async fn subscribe(
        &self,
        kind: EventKind,
    ) -> Result<mpsc::Receiver<SourcedEvent>, IndexerError>;
}
