//! Indexing cursor — tracks the highest fully indexed block for a chain.

/// The indexer's position in the chain.
///
/// Derived at startup from the repository's latest persisted block and
/// held in memory from then on. The cursor only moves forward through
/// [`IndexingCursor::advance`]; the single exception is an explicit
/// [`IndexingCursor::rollback`] to a reorg divergence point.
#[derive(Debug, Clone)]
pub struct IndexingCursor {
    chain_id: u64,
    latest_indexed: u64,
}

impl IndexingCursor {
    /// Create a cursor positioned at `latest_indexed`.
    pub fn new(chain_id: u64, latest_indexed: u64) -> Self {
        Self { chain_id, latest_indexed }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The highest block number already fully indexed.
    pub fn latest(&self) -> u64 {
        self.latest_indexed
    }

    /// The next block to index (cursor + 1).
    pub fn next_block(&self) -> u64 {
        self.latest_indexed + 1
    }

    /// Advance to `block`. Never moves the cursor backward — a stale or
    /// repeated advance is a no-op.
    pub fn advance(&mut self, block: u64) {
        self.latest_indexed = self.latest_indexed.max(block);
    }

    /// Reset the cursor backward to `block` after a reorg rollback.
    pub fn rollback(&mut self, block: u64) {
        tracing::info!(
            chain_id = self.chain_id,
            from = self.latest_indexed,
            to = block,
            "cursor rolled back"
        );
        self.latest_indexed = block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_monotonic() {
        let mut cursor = IndexingCursor::new(1, 100);
        cursor.advance(110);
        assert_eq!(cursor.latest(), 110);
        cursor.advance(105); // stale advance ignored
        assert_eq!(cursor.latest(), 110);
        assert_eq!(cursor.next_block(), 111);
    }

    #[test]
    fn rollback_moves_backward() {
        let mut cursor = IndexingCursor::new(1, 105);
        cursor.rollback(99);
        assert_eq!(cursor.latest(), 99);
        cursor.advance(100);
        assert_eq!(cursor.latest(), 100);
    }
}
