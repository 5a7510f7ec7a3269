//! Sync-mode controller — computes the initial cursor position.

use std::sync::Arc;

use eventindex_core::error::IndexerError;
use eventindex_core::mode::SyncMode;
use eventindex_core::repo::EventRepository;

/// Starting block for a scan, per mode:
///
/// - [`SyncMode::Sync`]: resume from the latest persisted block, minus
///   one — the last block is re-processed to cover a window that was
///   partially written when the process died. Falls back to genesis
///   when nothing is persisted.
/// - [`SyncMode::Resync`]: always genesis; the operator is expected to
///   have cleared the repository.
///
/// No side effects; the caller seeds the in-memory cursor with the
/// returned value.
pub async fn starting_block(
    events: &Arc<dyn EventRepository>,
    chain_id: u64,
    mode: SyncMode,
    genesis_height: u64,
) -> Result<u64, IndexerError> {
    let start = match mode {
        SyncMode::Resync => genesis_height,
        SyncMode::Sync => {
            let latest = events.find_latest_block_id(chain_id).await?;
            if latest > 0 {
                latest - 1
            } else {
                genesis_height
            }
        }
    };
    tracing::info!(chain_id, %mode, start, "initial cursor computed");
    Ok(start)
}
