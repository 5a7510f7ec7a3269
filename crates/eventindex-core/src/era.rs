//! Fork-era selection — which event schema governs a block height.
//!
//! The monitored contracts went through two hard forks, each replacing
//! the event schema: the legacy block-lifecycle events, the Pacaya batch
//! events, and the Shasta proposal events. Era selection is a pure
//! function of block height over the configured activation schedule.

use serde::{Deserialize, Serialize};

/// A named period during which the monitored contracts expose one
/// particular event schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkEra {
    /// Legacy L1 block-lifecycle events (proposed/proven/verified).
    LegacyL1,
    /// Pacaya batch-lifecycle events.
    Pacaya,
    /// Shasta proposal/proof events.
    Shasta,
}

impl std::fmt::Display for ForkEra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyL1 => write!(f, "legacy-l1"),
            Self::Pacaya => write!(f, "pacaya"),
            Self::Shasta => write!(f, "shasta"),
        }
    }
}

/// Activation heights for the hard forks, from protocol configuration.
///
/// `None` means the fork never activates on this chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSchedule {
    pub pacaya_height: Option<u64>,
    pub shasta_height: Option<u64>,
}

impl ForkSchedule {
    /// The era governing `block`. Later forks win when heights collide.
    pub fn era_at(&self, block: u64) -> ForkEra {
        if let Some(shasta) = self.shasta_height {
            if block >= shasta {
                return ForkEra::Shasta;
            }
        }
        if let Some(pacaya) = self.pacaya_height {
            if block >= pacaya {
                return ForkEra::Pacaya;
            }
        }
        ForkEra::LegacyL1
    }

    /// Activation height of `era`, if the schedule defines one.
    pub fn activation_height(&self, era: ForkEra) -> Option<u64> {
        match era {
            ForkEra::LegacyL1 => Some(0),
            ForkEra::Pacaya => self.pacaya_height,
            ForkEra::Shasta => self.shasta_height,
        }
    }
}
