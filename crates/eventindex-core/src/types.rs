//! Shared types for the indexing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The zero address, treated as the mint source / burn sink for transfers.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ─── BlockHeader ──────────────────────────────────────────────────────────────

/// A minimal block header — enough for cursoring and timestamp resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Parent block hash (`0x…`).
    pub parent_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

// ─── RawLog / LogFilter ──────────────────────────────────────────────────────

/// A raw EVM log as surfaced by the chain client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    /// Contract address that emitted the log.
    pub address: String,
    /// Indexed topics (`topics[0]` is the event signature hash).
    pub topics: Vec<String>,
    /// ABI-encoded, non-indexed payload (`0x…`).
    pub data: String,
    /// Block number the log was emitted in.
    pub block_number: u64,
    /// Transaction hash.
    pub tx_hash: String,
    /// Log index within the block.
    pub log_index: u32,
    /// `true` if the provider flagged the log as removed by a reorg.
    pub removed: bool,
}

/// Filter for a raw log query over a block range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    /// Only logs from these contract addresses (empty = all addresses).
    pub addresses: Vec<String>,
    /// Only logs whose `topics[0]` is one of these (empty = all events).
    pub topic0_values: Vec<String>,
    /// Start block (inclusive).
    pub from_block: u64,
    /// End block (inclusive).
    pub to_block: u64,
}

impl LogFilter {
    /// Create a filter over `[from, to]` for the given event signatures.
    pub fn for_topics(from: u64, to: u64, topics: &[&str]) -> Self {
        Self {
            addresses: vec![],
            topic0_values: topics.iter().map(|t| (*t).to_string()).collect(),
            from_block: from,
            to_block: to,
        }
    }

    /// Returns `true` if `topic0` matches this filter.
    pub fn matches_topic0(&self, topic0: &str) -> bool {
        self.topic0_values.is_empty()
            || self.topic0_values.iter().any(|t| t.eq_ignore_ascii_case(topic0))
    }
}

// ─── EventKind ───────────────────────────────────────────────────────────────

/// The kinds of protocol events this indexer normalizes into records.
///
/// The first three belong to the legacy L1 block-lifecycle schema, the
/// `Batch*` kinds to the Pacaya batch schema, and `Proposed`/`Proved` to
/// the Shasta proposal schema. `MessageSent` is emitted by the bridge in
/// every era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BlockProposed,
    BlockProven,
    BlockVerified,
    MessageSent,
    BatchProposed,
    BatchesProved,
    BatchesVerified,
    Proposed,
    Proved,
}

impl EventKind {
    /// Stable string form used for storage rows and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockProposed => "block_proposed",
            Self::BlockProven => "block_proven",
            Self::BlockVerified => "block_verified",
            Self::MessageSent => "message_sent",
            Self::BatchProposed => "batch_proposed",
            Self::BatchesProved => "batches_proved",
            Self::BatchesVerified => "batches_verified",
            Self::Proposed => "proposed",
            Self::Proved => "proved",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block_proposed" => Ok(Self::BlockProposed),
            "block_proven" => Ok(Self::BlockProven),
            "block_verified" => Ok(Self::BlockVerified),
            "message_sent" => Ok(Self::MessageSent),
            "batch_proposed" => Ok(Self::BatchProposed),
            "batches_proved" => Ok(Self::BatchesProved),
            "batches_verified" => Ok(Self::BatchesVerified),
            "proposed" => Ok(Self::Proposed),
            "proved" => Ok(Self::Proved),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

// ─── Event records ───────────────────────────────────────────────────────────

/// A normalized event record ready to be persisted.
///
/// `block_id` is always the block the log was emitted in. The event's
/// *subject* — the rollup block a lifecycle event refers to — goes into
/// `related_block_id`; batch/proposal ids go into `batch_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub kind: EventKind,
    pub chain_id: u64,
    /// Block the log was emitted in.
    pub block_id: u64,
    /// Contract address that emitted the log.
    pub address: String,
    /// Raw decoded payload, kept as JSON for downstream consumers.
    pub data: serde_json::Value,
    /// Subject block of a lifecycle event (proposed/proven/verified), or
    /// the last block covered by a batch/proposal.
    pub related_block_id: Option<u64>,
    /// Batch or proposal id, for batch-lifecycle kinds.
    pub batch_id: Option<u64>,
    pub token_id: Option<String>,
    /// Decimal string; message value, bond, or reward depending on kind.
    pub amount: Option<String>,
    pub assigned_prover: Option<String>,
    pub tier: Option<u16>,
    /// Timestamp of the emitting block.
    pub transacted_at: Option<DateTime<Utc>>,
}

impl NewEvent {
    /// Minimal record: kind, chain, emitting block, address, payload.
    /// Optional columns start empty.
    pub fn new(
        kind: EventKind,
        chain_id: u64,
        block_id: u64,
        address: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            chain_id,
            block_id,
            address: address.into(),
            data,
            related_block_id: None,
            batch_id: None,
            token_id: None,
            amount: None,
            assigned_prover: None,
            tier: None,
            transacted_at: None,
        }
    }
}

/// A persisted event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Storage-assigned row id.
    pub id: i64,
    #[serde(flatten)]
    pub event: NewEvent,
}

// ─── Balances / token metadata ───────────────────────────────────────────────

/// Which token standard a balance row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    Erc20,
    Erc721,
    Erc1155,
}

/// One side of a paired balance mutation (an increase or a decrease).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    pub chain_id: u64,
    /// Holder address.
    pub address: String,
    pub contract_address: String,
    pub standard: TokenStandard,
    /// Token id for NFT standards; `None` for fungible tokens.
    pub token_id: Option<String>,
    /// Decimal string delta, always non-negative.
    pub amount: String,
}

/// Token metadata as resolved at the chain-client boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: Option<u8>,
}

/// A persisted ERC-20 metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Metadata {
    pub id: i64,
    pub chain_id: u64,
    pub contract_address: String,
    pub symbol: String,
    pub decimals: u8,
}
