//! Repository traits — the persistence contracts consumed by the engine.
//!
//! Implementations live in `eventindex-storage` (in-memory and Postgres).
//! The engine only ever talks to these traits; no SQL or storage detail
//! leaks above this boundary.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::stat::{Stat, StatKind};
use crate::types::{BalanceChange, Erc20Metadata, EventKind, NewEvent, StoredEvent};

/// Persistence contract for normalized event records.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append one event record.
    async fn save(&self, event: NewEvent) -> Result<StoredEvent, IndexerError>;

    /// Highest emitting-block id persisted for `chain_id`, across all
    /// kinds. Returns 0 when the chain has no records.
    async fn find_latest_block_id(&self, chain_id: u64) -> Result<u64, IndexerError>;

    /// Highest emitting-block id persisted for `(chain_id, kind)`.
    /// Returns 0 when the kind has no records. This is the comparison
    /// key for chain-level reorg detection: a later log of the same
    /// kind referencing a block at or below this value means history
    /// was rewritten.
    async fn find_latest_block_id_by_kind(
        &self,
        chain_id: u64,
        kind: EventKind,
    ) -> Result<u64, IndexerError>;

    /// Delete every record of `chain_id` with emitting block id
    /// `>= block_id`, across all kinds. Returns the number of rows
    /// removed. This is the chain-level reorg rollback primitive.
    async fn delete_all_after_block_id(
        &self,
        chain_id: u64,
        block_id: u64,
    ) -> Result<u64, IndexerError>;

    /// Look up the record of `kind` whose *subject* block is `block_id`
    /// (the `related_block_id` column, not the emitting block).
    async fn find_by_kind_and_block_id(
        &self,
        chain_id: u64,
        kind: EventKind,
        block_id: u64,
    ) -> Result<Option<StoredEvent>, IndexerError>;

    /// Look up the record of `kind` for a given batch/proposal id.
    async fn find_by_kind_and_batch_id(
        &self,
        chain_id: u64,
        kind: EventKind,
        batch_id: u64,
    ) -> Result<Option<StoredEvent>, IndexerError>;

    /// The record of `kind` with the highest batch/proposal id, used to
    /// carry the previous batch's last-block id forward.
    async fn find_latest_by_kind(
        &self,
        chain_id: u64,
        kind: EventKind,
    ) -> Result<Option<StoredEvent>, IndexerError>;

    /// Delete a single record by row id.
    async fn delete(&self, id: i64) -> Result<(), IndexerError>;
}

/// Persistence contract for NFT balances (ERC-721 / ERC-1155).
#[async_trait]
pub trait NftBalanceRepository: Send + Sync {
    /// Apply a paired balance mutation in one storage transaction.
    ///
    /// Either side may be `None`: a mint has no decrease, a burn has no
    /// increase. Atomicity of the pair is the repository's duty — the
    /// engine never re-derives balances from event history.
    async fn increase_and_decrease_balances_in_tx(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError>;
}

/// Persistence contract for ERC-20 balances and token metadata.
#[async_trait]
pub trait Erc20BalanceRepository: Send + Sync {
    async fn find_metadata(
        &self,
        chain_id: u64,
        contract_address: &str,
    ) -> Result<Option<Erc20Metadata>, IndexerError>;

    async fn create_metadata(
        &self,
        chain_id: u64,
        contract_address: &str,
        symbol: &str,
        decimals: u8,
    ) -> Result<Erc20Metadata, IndexerError>;

    /// Apply a paired balance mutation in one storage transaction.
    async fn increase_and_decrease_balances_in_tx(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError>;
}

/// Persistence contract for the per-kind processed-block marker the live
/// subscriber maintains.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// Latest processed block height for `(chain_id, kind)`; 0 when the
    /// marker has never been written.
    async fn get_latest_block_processed(
        &self,
        chain_id: u64,
        kind: &str,
    ) -> Result<u64, IndexerError>;

    /// Upsert the marker for `(chain_id, kind)`.
    async fn save(&self, chain_id: u64, kind: &str, height: u64) -> Result<(), IndexerError>;
}

/// Persistence contract for running statistics.
#[async_trait]
pub trait StatRepository: Send + Sync {
    async fn find(&self, chain_id: u64, kind: StatKind) -> Result<Option<Stat>, IndexerError>;

    /// Upsert a stat row.
    async fn save(&self, stat: Stat) -> Result<(), IndexerError>;
}
