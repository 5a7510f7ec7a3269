//! In-memory storage backend for tests and ephemeral runs.
//!
//! Implements every repository trait over mutex-guarded maps. Balances
//! are signed so that over-withdrawal (e.g. the documented duplicate-log
//! gap) stays visible instead of saturating away.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use eventindex_core::error::IndexerError;
use eventindex_core::repo::{
    BlockRepository, Erc20BalanceRepository, EventRepository, NftBalanceRepository, StatRepository,
};
use eventindex_core::stat::{Stat, StatKind};
use eventindex_core::types::{
    BalanceChange, Erc20Metadata, EventKind, NewEvent, StoredEvent, TokenStandard,
};

#[derive(Default)]
pub struct InMemoryStorage {
    events: Mutex<Vec<StoredEvent>>,
    next_event_id: Mutex<i64>,
    /// `(chain, holder, contract, token_id) → amount`
    nft_balances: Mutex<HashMap<(u64, String, String, String), i128>>,
    nft_standards: Mutex<HashMap<(u64, String), TokenStandard>>,
    /// `(chain, holder, contract) → amount`
    erc20_balances: Mutex<HashMap<(u64, String, String), i128>>,
    erc20_metadata: Mutex<HashMap<(u64, String), Erc20Metadata>>,
    next_metadata_id: Mutex<i64>,
    markers: Mutex<HashMap<(u64, String), u64>>,
    stats: Mutex<HashMap<(u64, StatKind), Stat>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_amount(amount: &str) -> Result<i128, IndexerError> {
        amount
            .parse::<i128>()
            .map_err(|_| IndexerError::Storage(format!("unrepresentable amount: {amount}")))
    }

    // ── Inspection helpers (used by tests and dev tooling) ──

    pub fn events(&self, chain_id: u64) -> Vec<StoredEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event.chain_id == chain_id)
            .cloned()
            .collect()
    }

    pub fn events_of_kind(&self, chain_id: u64, kind: EventKind) -> Vec<StoredEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event.chain_id == chain_id && r.event.kind == kind)
            .cloned()
            .collect()
    }

    pub fn nft_balance(
        &self,
        chain_id: u64,
        holder: &str,
        contract: &str,
        token_id: &str,
    ) -> Option<i128> {
        self.nft_balances
            .lock()
            .unwrap()
            .get(&(chain_id, holder.to_string(), contract.to_string(), token_id.to_string()))
            .copied()
    }

    pub fn erc20_balance(&self, chain_id: u64, holder: &str, contract: &str) -> Option<i128> {
        self.erc20_balances
            .lock()
            .unwrap()
            .get(&(chain_id, holder.to_string(), contract.to_string()))
            .copied()
    }

    pub fn erc20_metadata(&self, chain_id: u64, contract: &str) -> Option<Erc20Metadata> {
        self.erc20_metadata
            .lock()
            .unwrap()
            .get(&(chain_id, contract.to_string()))
            .cloned()
    }

    pub fn marker(&self, chain_id: u64, kind: &str) -> u64 {
        self.markers
            .lock()
            .unwrap()
            .get(&(chain_id, kind.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn stat(&self, chain_id: u64, kind: StatKind) -> Option<Stat> {
        self.stats.lock().unwrap().get(&(chain_id, kind)).cloned()
    }
}

#[async_trait]
impl EventRepository for InMemoryStorage {
    async fn save(&self, event: NewEvent) -> Result<StoredEvent, IndexerError> {
        let mut next_id = self.next_event_id.lock().unwrap();
        *next_id += 1;
        let stored = StoredEvent { id: *next_id, event };
        self.events.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn find_latest_block_id(&self, chain_id: u64) -> Result<u64, IndexerError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event.chain_id == chain_id)
            .map(|r| r.event.block_id)
            .max()
            .unwrap_or(0))
    }

    async fn find_latest_block_id_by_kind(
        &self,
        chain_id: u64,
        kind: EventKind,
    ) -> Result<u64, IndexerError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event.chain_id == chain_id && r.event.kind == kind)
            .map(|r| r.event.block_id)
            .max()
            .unwrap_or(0))
    }

    async fn delete_all_after_block_id(
        &self,
        chain_id: u64,
        block_id: u64,
    ) -> Result<u64, IndexerError> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|r| !(r.event.chain_id == chain_id && r.event.block_id >= block_id));
        Ok((before - events.len()) as u64)
    }

    async fn find_by_kind_and_block_id(
        &self,
        chain_id: u64,
        kind: EventKind,
        block_id: u64,
    ) -> Result<Option<StoredEvent>, IndexerError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.event.chain_id == chain_id
                    && r.event.kind == kind
                    && r.event.related_block_id == Some(block_id)
            })
            .cloned())
    }

    async fn find_by_kind_and_batch_id(
        &self,
        chain_id: u64,
        kind: EventKind,
        batch_id: u64,
    ) -> Result<Option<StoredEvent>, IndexerError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.event.chain_id == chain_id
                    && r.event.kind == kind
                    && r.event.batch_id == Some(batch_id)
            })
            .cloned())
    }

    async fn find_latest_by_kind(
        &self,
        chain_id: u64,
        kind: EventKind,
    ) -> Result<Option<StoredEvent>, IndexerError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event.chain_id == chain_id && r.event.kind == kind)
            .max_by_key(|r| (r.event.batch_id, r.id))
            .cloned())
    }

    async fn delete(&self, id: i64) -> Result<(), IndexerError> {
        self.events.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}

#[async_trait]
impl NftBalanceRepository for InMemoryStorage {
    async fn increase_and_decrease_balances_in_tx(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError> {
        // One lock acquisition for the pair stands in for the storage
        // transaction.
        let mut balances = self.nft_balances.lock().unwrap();
        let mut standards = self.nft_standards.lock().unwrap();
        for (change, sign) in
            [(increase, 1i128), (decrease, -1i128)].into_iter().filter_map(|(c, s)| c.map(|c| (c, s)))
        {
            let delta = Self::parse_amount(&change.amount)? * sign;
            let token_id = change.token_id.clone().unwrap_or_default();
            let key =
                (change.chain_id, change.address.clone(), change.contract_address.clone(), token_id);
            *balances.entry(key).or_insert(0) += delta;
            standards
                .insert((change.chain_id, change.contract_address.clone()), change.standard);
        }
        Ok(())
    }
}

#[async_trait]
impl Erc20BalanceRepository for InMemoryStorage {
    async fn find_metadata(
        &self,
        chain_id: u64,
        contract_address: &str,
    ) -> Result<Option<Erc20Metadata>, IndexerError> {
        Ok(self.erc20_metadata(chain_id, contract_address))
    }

    async fn create_metadata(
        &self,
        chain_id: u64,
        contract_address: &str,
        symbol: &str,
        decimals: u8,
    ) -> Result<Erc20Metadata, IndexerError> {
        let mut next_id = self.next_metadata_id.lock().unwrap();
        *next_id += 1;
        let row = Erc20Metadata {
            id: *next_id,
            chain_id,
            contract_address: contract_address.to_string(),
            symbol: symbol.to_string(),
            decimals,
        };
        self.erc20_metadata
            .lock()
            .unwrap()
            .insert((chain_id, contract_address.to_string()), row.clone());
        Ok(row)
    }

    async fn increase_and_decrease_balances_in_tx(
        &self,
        increase: Option<BalanceChange>,
        decrease: Option<BalanceChange>,
    ) -> Result<(), IndexerError> {
        let mut balances = self.erc20_balances.lock().unwrap();
        for (change, sign) in
            [(increase, 1i128), (decrease, -1i128)].into_iter().filter_map(|(c, s)| c.map(|c| (c, s)))
        {
            let delta = Self::parse_amount(&change.amount)? * sign;
            let key = (change.chain_id, change.address.clone(), change.contract_address.clone());
            *balances.entry(key).or_insert(0) += delta;
        }
        Ok(())
    }
}

#[async_trait]
impl BlockRepository for InMemoryStorage {
    async fn get_latest_block_processed(
        &self,
        chain_id: u64,
        kind: &str,
    ) -> Result<u64, IndexerError> {
        Ok(self.marker(chain_id, kind))
    }

    async fn save(&self, chain_id: u64, kind: &str, height: u64) -> Result<(), IndexerError> {
        self.markers.lock().unwrap().insert((chain_id, kind.to_string()), height);
        Ok(())
    }
}

#[async_trait]
impl StatRepository for InMemoryStorage {
    async fn find(&self, chain_id: u64, kind: StatKind) -> Result<Option<Stat>, IndexerError> {
        Ok(self.stat(chain_id, kind))
    }

    async fn save(&self, stat: Stat) -> Result<(), IndexerError> {
        self.stats.lock().unwrap().insert((stat.chain_id, stat.kind), stat);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, chain_id: u64, block_id: u64) -> NewEvent {
        NewEvent::new(kind, chain_id, block_id, "0xabc", serde_json::json!({}))
    }

    fn change(chain_id: u64, address: &str, amount: &str) -> BalanceChange {
        BalanceChange {
            chain_id,
            address: address.to_string(),
            contract_address: "0xtoken".to_string(),
            standard: TokenStandard::Erc20,
            token_id: None,
            amount: amount.to_string(),
        }
    }

    #[tokio::test]
    async fn latest_block_id_per_chain_and_kind() {
        let storage = InMemoryStorage::new();
        EventRepository::save(&storage, event(EventKind::BlockProposed, 1, 10)).await.unwrap();
        EventRepository::save(&storage, event(EventKind::MessageSent, 1, 20)).await.unwrap();
        EventRepository::save(&storage, event(EventKind::BlockProposed, 2, 99)).await.unwrap();

        assert_eq!(storage.find_latest_block_id(1).await.unwrap(), 20);
        assert_eq!(
            storage
                .find_latest_block_id_by_kind(1, EventKind::BlockProposed)
                .await
                .unwrap(),
            10
        );
        assert_eq!(storage.find_latest_block_id(3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_all_after_block_is_chain_scoped() {
        let storage = InMemoryStorage::new();
        for block in [10, 11, 12] {
            EventRepository::save(&storage, event(EventKind::BlockProposed, 1, block)).await.unwrap();
        }
        EventRepository::save(&storage, event(EventKind::BlockProposed, 2, 11)).await.unwrap();

        let deleted = storage.delete_all_after_block_id(1, 11).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(storage.events(1).len(), 1);
        assert_eq!(storage.events(2).len(), 1);
    }

    #[tokio::test]
    async fn slot_lookups_use_subject_and_batch_columns() {
        let storage = InMemoryStorage::new();
        let mut proven = event(EventKind::BlockProven, 1, 50);
        proven.related_block_id = Some(12);
        EventRepository::save(&storage, proven).await.unwrap();
        let mut batch = event(EventKind::BatchProposed, 1, 51);
        batch.batch_id = Some(7);
        EventRepository::save(&storage, batch).await.unwrap();

        assert!(storage
            .find_by_kind_and_block_id(1, EventKind::BlockProven, 12)
            .await
            .unwrap()
            .is_some());
        // The emitting block is not the slot key.
        assert!(storage
            .find_by_kind_and_block_id(1, EventKind::BlockProven, 50)
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .find_by_kind_and_batch_id(1, EventKind::BatchProposed, 7)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn latest_by_kind_prefers_highest_batch_id() {
        let storage = InMemoryStorage::new();
        for batch_id in [3, 7, 5] {
            let mut ev = event(EventKind::BatchProposed, 1, 100 + batch_id);
            ev.batch_id = Some(batch_id);
            EventRepository::save(&storage, ev).await.unwrap();
        }

        let latest = storage
            .find_latest_by_kind(1, EventKind::BatchProposed)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.event.batch_id, Some(7));
    }

    #[tokio::test]
    async fn paired_balance_mutation_is_symmetric() {
        let storage = InMemoryStorage::new();
        Erc20BalanceRepository::increase_and_decrease_balances_in_tx(
            &storage,
            Some(change(1, "0xb0b", "400")),
            Some(change(1, "0xa11ce", "400")),
        )
        .await
        .unwrap();

        assert_eq!(storage.erc20_balance(1, "0xb0b", "0xtoken"), Some(400));
        assert_eq!(storage.erc20_balance(1, "0xa11ce", "0xtoken"), Some(-400));
    }

    #[tokio::test]
    async fn unparseable_amount_is_a_storage_error() {
        let storage = InMemoryStorage::new();
        let result = Erc20BalanceRepository::increase_and_decrease_balances_in_tx(
            &storage,
            Some(change(1, "0xb0b", "one hundred")),
            None,
        )
        .await;
        assert!(matches!(result, Err(IndexerError::Storage(_))));
    }

    #[tokio::test]
    async fn metadata_create_then_find() {
        let storage = InMemoryStorage::new();
        assert!(storage.find_metadata(1, "0xtoken").await.unwrap().is_none());

        let row = storage.create_metadata(1, "0xtoken", "TKO", 18).await.unwrap();
        assert_eq!(row.symbol, "TKO");

        let found = storage.find_metadata(1, "0xtoken").await.unwrap().unwrap();
        assert_eq!(found.id, row.id);
        assert_eq!(found.decimals, 18);
    }

    #[tokio::test]
    async fn marker_and_stat_upserts() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.get_latest_block_processed(1, "message_sent").await.unwrap(), 0);
        BlockRepository::save(&storage, 1, "message_sent", 55).await.unwrap();
        assert_eq!(storage.get_latest_block_processed(1, "message_sent").await.unwrap(), 55);

        let mut stat = Stat::empty(1, StatKind::ProofTime);
        stat.fold(30);
        StatRepository::save(&storage, stat).await.unwrap();
        assert_eq!(storage.stat(1, StatKind::ProofTime).unwrap().count, 1);
    }
}
