//! Mock chain client and event source shared by the crate's tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use eventindex_core::cache::TokenMetadataCache;
use eventindex_core::cursor::IndexingCursor;
use eventindex_core::error::IndexerError;
use eventindex_core::indexer::IndexerConfig;
use eventindex_core::types::{BlockHeader, EventKind, LogFilter, RawLog, TokenMetadata};
use eventindex_storage::memory::InMemoryStorage;

use crate::chain::ChainClient;
use crate::events::{
    BatchProposedData, BatchesProvedData, BatchesVerifiedData, BlockProposedData,
    BlockProvenData, BlockVerifiedData, ChainEvent, EventSource, LogMeta, MessageSentData,
    ProposedData, ProvedData, SourcedEvent,
};
use crate::persist::Persisters;
use crate::scanner::BatchRangeScanner;
use crate::strategy::FilterStrategy;
use crate::subscriber::LiveSubscriber;

pub(crate) const TEST_CHAIN_ID: u64 = 1;

// ─── MockChainClient ─────────────────────────────────────────────────────────

pub(crate) struct MockChainClient {
    head: AtomicU64,
    logs: Mutex<Vec<RawLog>>,
    metadata_calls: AtomicU64,
    filter_calls: AtomicU64,
    head_senders: Mutex<Vec<mpsc::Sender<BlockHeader>>>,
    head_sub_count: AtomicU64,
}

impl MockChainClient {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            logs: Mutex::new(vec![]),
            metadata_calls: AtomicU64::new(0),
            filter_calls: AtomicU64::new(0),
            head_senders: Mutex::new(vec![]),
            head_sub_count: AtomicU64::new(0),
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn filter_calls(&self) -> u64 {
        self.filter_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> u64 {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub async fn emit_head(&self, number: u64) {
        let senders = self.head_senders.lock().unwrap().clone();
        for sender in senders {
            let _ = sender.send(header_for(number)).await;
        }
    }

    pub async fn wait_for_head_subscriber(&self) {
        while self.head_sub_count.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

fn header_for(number: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: format!("0x{number:064x}"),
        parent_hash: format!("0x{:064x}", number.saturating_sub(1)),
        timestamp: 1_700_000_000 + number as i64 * 12,
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn chain_id(&self) -> Result<u64, IndexerError> {
        Ok(TEST_CHAIN_ID)
    }

    async fn head_number(&self) -> Result<u64, IndexerError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn header_by_number(&self, number: u64) -> Result<BlockHeader, IndexerError> {
        Ok(header_for(number))
    }

    async fn transaction_sender(&self, _tx_hash: &str) -> Result<String, IndexerError> {
        Ok("0x5e4de6b5e6b5e6b5e6b5e6b5e6b5e6b5e6b5e6b5".to_string())
    }

    async fn filter_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, IndexerError> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| {
                log.block_number >= filter.from_block
                    && log.block_number <= filter.to_block
                    && log.topics.first().is_some_and(|t| filter.matches_topic0(t))
            })
            .cloned()
            .collect())
    }

    async fn subscribe_heads(&self) -> Result<mpsc::Receiver<BlockHeader>, IndexerError> {
        let (tx, rx) = mpsc::channel(32);
        self.head_senders.lock().unwrap().push(tx);
        self.head_sub_count.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    async fn token_metadata(
        &self,
        _address: &str,
    ) -> Result<Option<TokenMetadata>, IndexerError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(TokenMetadata { symbol: "MOCK".into(), decimals: Some(18) }))
    }
}

// ─── MockEventSource ─────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct MockEventSource {
    events: Mutex<Vec<SourcedEvent>>,
    fail_once: Mutex<HashSet<EventKind>>,
    calls: Mutex<Vec<(EventKind, u64, u64)>>,
    subscribers: Mutex<HashMap<EventKind, Vec<mpsc::Sender<SourcedEvent>>>>,
    sub_counts: Mutex<HashMap<EventKind, u32>>,
}

impl MockEventSource {
    pub fn push_event(&self, event: SourcedEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn remove_events_emitted_at(&self, block: u64) {
        self.events.lock().unwrap().retain(|e| e.meta.block_id != block);
    }

    /// The next `events_in_range` call for `kind` fails once.
    pub fn fail_next(&self, kind: EventKind) {
        self.fail_once.lock().unwrap().insert(kind);
    }

    pub fn range_calls(&self, kind: EventKind) -> Vec<(u64, u64)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .map(|(_, from, to)| (*from, *to))
            .collect()
    }

    pub fn subscribe_count(&self, kind: EventKind) -> u32 {
        self.sub_counts.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub async fn wait_for_subscriber(&self, kind: EventKind) {
        while self.subscribe_count(kind) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn emit(&self, kind: EventKind, event: SourcedEvent) {
        let senders = self
            .subscribers
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        for sender in senders {
            let _ = sender.send(event.clone()).await;
        }
    }

    /// Drop every live subscription channel for `kind`, closing the
    /// receivers.
    pub fn drop_subscribers(&self, kind: EventKind) {
        self.subscribers.lock().unwrap().remove(&kind);
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn events_in_range(
        &self,
        kind: EventKind,
        from: u64,
        to: u64,
    ) -> Result<Vec<SourcedEvent>, IndexerError> {
        self.calls.lock().unwrap().push((kind, from, to));
        if self.fail_once.lock().unwrap().remove(&kind) {
            return Err(IndexerError::Rpc("injected failure".into()));
        }
        let mut events: Vec<SourcedEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.payload.kind() == kind && e.meta.block_id >= from && e.meta.block_id <= to
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.meta.block_id, e.meta.log_index));
        Ok(events)
    }

    async fn subscribe(
        &self,
        kind: EventKind,
    ) -> Result<mpsc::Receiver<SourcedEvent>, IndexerError> {
        let (tx, rx) = mpsc::channel(32);
        self.subscribers.lock().unwrap().entry(kind).or_default().push(tx);
        *self.sub_counts.lock().unwrap().entry(kind).or_insert(0) += 1;
        Ok(rx)
    }
}

// ─── Event constructors ──────────────────────────────────────────────────────

fn meta(emitted: u64) -> LogMeta {
    LogMeta {
        block_id: emitted,
        tx_hash: format!("0x{emitted:064x}"),
        log_index: 0,
        address: "0x00000000000000000000000000000000deadbeef".to_string(),
    }
}

pub(crate) fn block_proposed_event(subject: u64, emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::BlockProposed(BlockProposedData {
            block_id: subject,
            assigned_prover: "0xaaaa00000000000000000000000000000000aaaa".into(),
            liveness_bond: "1000000000000000000".into(),
        }),
    }
}

pub(crate) fn block_proven_event(subject: u64, emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::BlockProven(BlockProvenData {
            block_id: subject,
            prover: "0xbbbb00000000000000000000000000000000bbbb".into(),
            tier: 300,
        }),
    }
}

pub(crate) fn block_verified_event(subject: u64, emitted: u64, reward: &str) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::BlockVerified(BlockVerifiedData {
            block_id: subject,
            prover: "0xbbbb00000000000000000000000000000000bbbb".into(),
            prover_reward: reward.into(),
        }),
    }
}

pub(crate) fn message_sent_event(value: &str, emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::MessageSent(MessageSentData {
            msg_hash: format!("0x{emitted:064x}"),
            from: "0x1111111111111111111111111111111111111111".into(),
            to: "0x2222222222222222222222222222222222222222".into(),
            value: value.into(),
        }),
    }
}

pub(crate) fn batch_proposed_event(batch_id: u64, last_block: u64, emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::BatchProposed(BatchProposedData {
            batch_id,
            last_block_id: last_block,
            proposer: "0xcccc00000000000000000000000000000000cccc".into(),
        }),
    }
}

pub(crate) fn batches_proved_event(batch_ids: &[u64], emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::BatchesProved(BatchesProvedData {
            batch_ids: batch_ids.to_vec(),
            prover: "0xbbbb00000000000000000000000000000000bbbb".into(),
        }),
    }
}

pub(crate) fn batches_verified_event(batch_id: u64, emitted: u64, reward: &str) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::BatchesVerified(BatchesVerifiedData {
            batch_id,
            prover: "0xbbbb00000000000000000000000000000000bbbb".into(),
            prover_reward: reward.into(),
        }),
    }
}

pub(crate) fn proposed_event(proposal_id: u64, last_block: u64, emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::Proposed(ProposedData {
            proposal_id,
            last_block_id: last_block,
            proposer: "0xcccc00000000000000000000000000000000cccc".into(),
        }),
    }
}

pub(crate) fn proved_event(first: u64, last: u64, emitted: u64) -> SourcedEvent {
    SourcedEvent {
        meta: meta(emitted),
        payload: ChainEvent::Proved(ProvedData {
            first_proposal_id: first,
            last_proposal_id: last,
            prover: "0xbbbb00000000000000000000000000000000bbbb".into(),
        }),
    }
}

// ─── Log constructors ────────────────────────────────────────────────────────

fn pad_address(address: &str) -> String {
    format!("0x{:0>64}", address.trim_start_matches("0x"))
}

fn pad_u128(value: u128) -> String {
    format!("{value:064x}")
}

pub(crate) fn erc721_transfer_log(
    contract: &str,
    from: &str,
    to: &str,
    token_id: u64,
    block: u64,
) -> RawLog {
    RawLog {
        address: contract.to_string(),
        topics: vec![
            crate::persist::decode::TRANSFER_TOPIC.to_string(),
            pad_address(from),
            pad_address(to),
            format!("0x{token_id:064x}"),
        ],
        data: "0x".to_string(),
        block_number: block,
        tx_hash: format!("0x{block:064x}"),
        log_index: 0,
        removed: false,
    }
}

pub(crate) fn erc20_transfer_log(
    contract: &str,
    from: &str,
    to: &str,
    amount: u128,
    block: u64,
) -> RawLog {
    RawLog {
        address: contract.to_string(),
        topics: vec![
            crate::persist::decode::TRANSFER_TOPIC.to_string(),
            pad_address(from),
            pad_address(to),
        ],
        data: format!("0x{}", pad_u128(amount)),
        block_number: block,
        tx_hash: format!("0x{block:064x}"),
        log_index: 1,
        removed: false,
    }
}

// ─── TestHarness ─────────────────────────────────────────────────────────────

pub(crate) struct TestHarness {
    pub client: Arc<MockChainClient>,
    pub source: Arc<MockEventSource>,
    pub storage: Arc<InMemoryStorage>,
    pub persisters: Arc<Persisters>,
    pub cursor: Arc<Mutex<IndexingCursor>>,
    pub config: IndexerConfig,
}

pub(crate) struct TestHarnessBuilder {
    head: u64,
    config: IndexerConfig,
}

impl TestHarnessBuilder {
    pub fn head(mut self, head: u64) -> Self {
        self.head = head;
        self
    }

    pub fn batch_size(mut self, size: u64) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn index_nfts(mut self, enabled: bool) -> Self {
        self.config.index_nfts = enabled;
        self
    }

    pub fn index_erc20(mut self, enabled: bool) -> Self {
        self.config.index_erc20 = enabled;
        self
    }

    pub fn min_message_value(mut self, value: &str) -> Self {
        self.config.min_message_value = value.to_string();
        self
    }

    pub fn pacaya_height(mut self, height: u64) -> Self {
        self.config.fork.pacaya_height = Some(height);
        self
    }

    pub fn shasta_height(mut self, height: u64) -> Self {
        self.config.fork.shasta_height = Some(height);
        self
    }

    pub async fn build(self) -> TestHarness {
        let client = Arc::new(MockChainClient::new(self.head));
        let source = Arc::new(MockEventSource::default());
        let storage = Arc::new(InMemoryStorage::new());
        let cursor = Arc::new(Mutex::new(IndexingCursor::new(TEST_CHAIN_ID, 0)));

        let persisters = Arc::new(Persisters::new(
            TEST_CHAIN_ID,
            self.config.clone(),
            client.clone(),
            storage.clone(),
            storage.clone(),
            storage.clone(),
            storage.clone(),
            TokenMetadataCache::new(),
            cursor.clone(),
        ));

        TestHarness { client, source, storage, persisters, cursor, config: self.config }
    }
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder {
            head: 10,
            config: IndexerConfig {
                batch_size: 10,
                poll_interval_ms: 20,
                subscription_backoff_ms: 10,
                ..Default::default()
            },
        }
    }

    pub fn source_dyn(&self) -> Arc<dyn EventSource> {
        self.source.clone()
    }

    pub fn scanner(&self, strategy: FilterStrategy) -> BatchRangeScanner {
        BatchRangeScanner::new(
            self.client.clone(),
            self.source.clone(),
            strategy,
            self.persisters.clone(),
            self.cursor.clone(),
            self.config.batch_size,
            Duration::from_millis(self.config.poll_interval_ms),
        )
    }

    pub fn subscriber(&self, kinds: Vec<EventKind>) -> Arc<LiveSubscriber> {
        Arc::new(LiveSubscriber::new(
            TEST_CHAIN_ID,
            self.client.clone(),
            self.source.clone(),
            self.persisters.clone(),
            self.storage.clone(),
            kinds,
            Duration::from_millis(self.config.subscription_backoff_ms),
            self.config.index_nfts || self.config.index_erc20,
        ))
    }

    pub fn context(&self) -> crate::indexer::IndexerContext {
        crate::indexer::IndexerContext {
            client: self.client.clone(),
            source: self.source.clone(),
            events: self.storage.clone(),
            nft_balances: self.storage.clone(),
            erc20_balances: self.storage.clone(),
            blocks: self.storage.clone(),
            stats: self.storage.clone(),
            metadata_cache: TokenMetadataCache::new(),
        }
    }
}
