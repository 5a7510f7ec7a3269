//! Fire-and-forget counters. The exporter is wired by the embedding
//! process; without one these are no-ops.

use metrics::counter;

use crate::types::EventKind;

/// Bump the processed counter for an event kind.
pub fn record_processed(kind: EventKind) {
    counter!("eventindex_events_processed_total", "kind" => kind.as_str()).increment(1);
}

/// Bump the error counter for an event kind.
pub fn record_error(kind: EventKind) {
    counter!("eventindex_events_processed_errors_total", "kind" => kind.as_str()).increment(1);
}

/// Bump the processed counter for the raw transfer sub-indexer.
pub fn record_transfers_processed(count: u64) {
    counter!("eventindex_token_transfers_processed_total").increment(count);
}
