//! Running statistics derived from proof events.

use serde::{Deserialize, Serialize};

/// Which derived statistic a row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Average seconds between a proposal and its proof.
    ProofTime,
    /// Average prover reward per verified proof, in wei.
    ProofReward,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProofTime => "proof_time",
            Self::ProofReward => "proof_reward",
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A running-average statistic for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub chain_id: u64,
    pub kind: StatKind,
    /// Current average as a decimal string.
    pub average: String,
    /// Number of samples folded into the average.
    pub count: u64,
}

impl Stat {
    /// An empty stat (average 0 over 0 samples).
    pub fn empty(chain_id: u64, kind: StatKind) -> Self {
        Self { chain_id, kind, average: "0".to_string(), count: 0 }
    }

    /// Fold one sample into the running average:
    /// `new = (avg * count + sample) / (count + 1)`.
    ///
    /// The read-modify-write around this is not atomic; concurrent
    /// updates can lose a sample (accepted best-effort behavior).
    pub fn fold(&mut self, sample: u128) {
        let avg: u128 = self.average.parse().unwrap_or(0);
        let count = u128::from(self.count);
        self.average = ((avg * count + sample) / (count + 1)).to_string();
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_from_empty() {
        let mut stat = Stat::empty(1, StatKind::ProofTime);
        stat.fold(30);
        assert_eq!(stat.average, "30");
        assert_eq!(stat.count, 1);
    }

    #[test]
    fn fold_running_average() {
        let mut stat = Stat::empty(1, StatKind::ProofTime);
        for sample in [10, 20, 30] {
            stat.fold(sample);
        }
        assert_eq!(stat.average, "20");
        assert_eq!(stat.count, 3);

        // (20*3 + 100) / 4 = 40
        stat.fold(100);
        assert_eq!(stat.average, "40");
        assert_eq!(stat.count, 4);
    }

    #[test]
    fn fold_survives_garbage_average() {
        let mut stat = Stat {
            chain_id: 1,
            kind: StatKind::ProofReward,
            average: "not-a-number".to_string(),
            count: 2,
        };
        stat.fold(9);
        assert_eq!(stat.average, "3"); // treated as avg 0 over 2 samples
    }
}
