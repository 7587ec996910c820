use crate::types::SeriesKey;
use serde::{Deserialize, Serialize};

/// Lifecycle of a detected gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapStatus {
    Pending,
    RepairedFromCache,
    RepairedFromSource,
    ForwardFilled,
    /// Terminal; needs operator attention.
    Irreparable,
}

impl GapStatus {
    pub fn is_repaired(&self) -> bool {
        matches!(
            self,
            Self::RepairedFromCache | Self::RepairedFromSource | Self::ForwardFilled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    pub key: SeriesKey,
    pub score: i64,
    pub status: GapStatus,
}

/// Outcome of scanning one score range of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub key: SeriesKey,
    pub start_score: i64,
    pub end_score: i64,
    pub scanned: usize,
    pub records: Vec<GapRecord>,
}

impl RepairReport {
    pub fn new(key: SeriesKey, start_score: i64, end_score: i64) -> Self {
        Self {
            key,
            start_score,
            end_score,
            scanned: 0,
            records: Vec::new(),
        }
    }

    /// Scores left irreparable; empty means the range is fully healed.
    pub fn unrepaired(&self) -> Vec<i64> {
        self.scores_with(GapStatus::Irreparable)
    }

    pub fn repaired(&self) -> Vec<i64> {
        self.records
            .iter()
            .filter(|r| r.status.is_repaired())
            .map(|r| r.score)
            .collect()
    }

    pub fn scores_with(&self, status: GapStatus) -> Vec<i64> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.score)
            .collect()
    }

    pub fn is_healed(&self) -> bool {
        self.records.iter().all(|r| r.status != GapStatus::Irreparable)
    }
}
