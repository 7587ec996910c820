//! Sorted, score-indexed storage for per-instrument series.
//!
//! Every successful insert is handed to the [`PublishDispatcher`]
//! synchronously before `save` returns, so a raw price write cascades through
//! the indicator subscribers within the same call tree.

use crate::error::{Result, StoreError};
use crate::services::dispatcher::{DispatchReport, Notification, PublishDispatcher};
use crate::types::{QueryResult, ScoreClock, ScorePoint, SeriesKey, SeriesQuery, SeriesValue};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A point that was committed to the store, forwarded to persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedPoint {
    pub key: SeriesKey,
    pub score: i64,
    pub value: SeriesValue,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// New point written; subscribers were notified.
    Inserted(DispatchReport),
    /// The same value already existed at this score. Nothing was notified.
    Unchanged,
}

impl SaveOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, SaveOutcome::Inserted(_))
    }
}

/// Time-series store keyed by [`SeriesKey`] and integer score.
pub struct TimeSeriesStore {
    clock: ScoreClock,
    series: DashMap<SeriesKey, BTreeMap<i64, SeriesValue>>,
    dispatcher: PublishDispatcher,
    commits: Option<mpsc::UnboundedSender<CommittedPoint>>,
}

impl TimeSeriesStore {
    /// Create a store that notifies through `dispatcher`.
    pub fn new(dispatcher: PublishDispatcher) -> Arc<Self> {
        Arc::new(Self {
            clock: ScoreClock::default(),
            series: DashMap::new(),
            dispatcher,
            commits: None,
        })
    }

    /// Create a store that also forwards every committed point to `commits`.
    pub fn with_commit_sink(
        dispatcher: PublishDispatcher,
        commits: mpsc::UnboundedSender<CommittedPoint>,
    ) -> Arc<Self> {
        Arc::new(Self {
            clock: ScoreClock::default(),
            series: DashMap::new(),
            dispatcher,
            commits: Some(commits),
        })
    }

    pub fn clock(&self) -> ScoreClock {
        self.clock
    }

    pub fn dispatcher(&self) -> &PublishDispatcher {
        &self.dispatcher
    }

    /// Save `value` at the bucket of `timestamp`.
    ///
    /// Raw classes place unaligned timestamps in the bucket that closes at or
    /// after them, the same bucket ingest and gap repair resample them into;
    /// derived classes reject them.
    pub fn save(
        &self,
        key: &SeriesKey,
        timestamp: i64,
        value: impl Into<SeriesValue>,
    ) -> Result<SaveOutcome> {
        if key.series_class.is_indicator() && !self.clock.is_aligned(timestamp) {
            return Err(StoreError::UnalignedTimestamp {
                key: key.to_string(),
                timestamp,
            });
        }
        let score = self.clock.closing_score(timestamp);
        self.save_at_score(key, score, value)
    }

    /// Save `value` at `score`, then notify subscribers of `key`'s class.
    pub fn save_at_score(
        &self,
        key: &SeriesKey,
        score: i64,
        value: impl Into<SeriesValue>,
    ) -> Result<SaveOutcome> {
        let value = value.into();
        if !self.insert(key, score, &value)? {
            debug!("{} already holds this value at score {}", key, score);
            return Ok(SaveOutcome::Unchanged);
        }

        if let Some(ref commits) = self.commits {
            let point = CommittedPoint {
                key: key.clone(),
                score,
                value: value.clone(),
            };
            if commits.send(point).is_err() {
                warn!("Commit sink closed; {} score {} not persisted", key, score);
            }
        }

        let note = Notification {
            key: key.clone(),
            score,
            timestamp: self.clock.timestamp_from_score(score),
            value,
        };
        Ok(SaveOutcome::Inserted(self.dispatcher.notify(self, &note)))
    }

    /// Insert without notifying anyone. Used to warm the store from
    /// persistence. Returns whether a new point was written.
    pub fn restore(&self, key: &SeriesKey, score: i64, value: impl Into<SeriesValue>) -> Result<bool> {
        self.insert(key, score, &value.into())
    }

    /// Write-once insert under the key's shard lock.
    fn insert(&self, key: &SeriesKey, score: i64, value: &SeriesValue) -> Result<bool> {
        key.validate()?;
        if !value.is_defined() {
            return Err(StoreError::IncompleteKey(format!(
                "undefined value for {} at score {}",
                key, score
            )));
        }

        let mut series = self.series.entry(key.clone()).or_default();
        match series.get(&score) {
            Some(existing) if existing == value => Ok(false),
            Some(_) => Err(StoreError::DuplicateScore {
                key: key.to_string(),
                score,
            }),
            None => {
                series.insert(score, value.clone());
                Ok(true)
            }
        }
    }

    /// Points in `[score(timestamp) - periods_range, score(timestamp) + tolerance]`,
    /// where `score(timestamp)` is the bucket `timestamp` falls in.
    pub fn query(
        &self,
        key: &SeriesKey,
        timestamp: i64,
        tolerance: u32,
        periods_range: u32,
    ) -> QueryResult {
        let center = self.clock.closing_score(timestamp);
        self.query_score(key, center, tolerance, periods_range)
    }

    /// Same as [`query`](Self::query) with the center given as a score.
    pub fn query_score(
        &self,
        key: &SeriesKey,
        center: i64,
        tolerance: u32,
        periods_range: u32,
    ) -> QueryResult {
        let low = center - i64::from(periods_range);
        let high = center + i64::from(tolerance);

        let (scores, values): (Vec<i64>, Vec<SeriesValue>) = match self.series.get(key) {
            Some(series) => series
                .range(low..=high)
                .map(|(score, value)| (*score, value.clone()))
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };

        QueryResult {
            key: key.to_string(),
            count: scores.len(),
            earliest_timestamp: scores.first().map(|s| self.clock.timestamp_from_score(*s)),
            latest_timestamp: scores.last().map(|s| self.clock.timestamp_from_score(*s)),
            values,
            scores,
        }
    }

    /// Execute a query received from a downstream consumer.
    pub fn run(&self, query: &SeriesQuery) -> QueryResult {
        self.query(
            &query.key,
            query.timestamp,
            query.tolerance,
            query.periods_range,
        )
    }

    /// Value stored at exactly `score`.
    pub fn get(&self, key: &SeriesKey, score: i64) -> Option<SeriesValue> {
        self.series.get(key)?.get(&score).cloned()
    }

    pub fn contains(&self, key: &SeriesKey, score: i64) -> bool {
        self.series
            .get(key)
            .map(|series| series.contains_key(&score))
            .unwrap_or(false)
    }

    /// Most recent point of a series.
    pub fn latest(&self, key: &SeriesKey) -> Option<ScorePoint> {
        let series = self.series.get(key)?;
        let (score, value) = series.iter().next_back()?;
        Some(ScorePoint {
            score: *score,
            value: value.clone(),
        })
    }

    /// Number of points in a series.
    pub fn len(&self, key: &SeriesKey) -> usize {
        self.series.get(key).map(|s| s.len()).unwrap_or(0)
    }

    /// All series keys currently held, sorted.
    pub fn keys(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.series.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}
