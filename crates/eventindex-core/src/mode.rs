//! Sync mode — resume from persisted state or resync from genesis.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// How the indexer picks its starting block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Resume from the latest persisted block (minus one, to re-process
    /// a possibly partially written window).
    Sync,
    /// Start over from the protocol genesis height. The operator is
    /// expected to have cleared the repository beforehand.
    Resync,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Resync => write!(f, "resync"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "resync" => Ok(Self::Resync),
            other => Err(IndexerError::InvalidSyncMode(other.to_string())),
        }
    }
}
