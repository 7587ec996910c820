use crate::error::Result;
use crate::services::history::RecordSource;
use crate::types::{RawRecord, Stream, Tick, TimeWindow};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Fine-grained raw ticks keyed by `{ticker}:{exchange}:{stream}`, one value
/// per second. The first value recorded for a second wins.
pub struct TickHistory {
    ticks: DashMap<String, BTreeMap<i64, f64>>,
}

impl TickHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(ticker: &str, exchange: &str, stream: Stream) -> String {
        format!("{}:{}:{}", ticker, exchange, stream)
    }

    /// Record a live tick. Returns false if that second was already held.
    pub fn record(&self, tick: &Tick) -> bool {
        self.insert(
            Self::key(&tick.ticker, &tick.exchange, tick.stream),
            tick.record(),
        )
    }

    /// Replay records fetched from an archive; returns how many were new.
    pub fn replay(&self, ticker: &str, exchange: &str, stream: Stream, records: &[RawRecord]) -> usize {
        let key = Self::key(ticker, exchange, stream);
        let saved = records
            .iter()
            .filter(|record| self.insert(key.clone(), **record))
            .count();
        debug!("Replayed {}/{} records into {}", saved, records.len(), key);
        saved
    }

    fn insert(&self, key: String, record: RawRecord) -> bool {
        if !record.value.is_finite() {
            return false;
        }
        let mut series = self.ticks.entry(key).or_default();
        if series.contains_key(&record.timestamp) {
            return false;
        }
        series.insert(record.timestamp, record.value);
        true
    }

    pub fn len(&self, ticker: &str, exchange: &str, stream: Stream) -> usize {
        self.ticks
            .get(&Self::key(ticker, exchange, stream))
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Drop one stream's ticks older than `before`.
    pub fn prune(&self, ticker: &str, exchange: &str, stream: Stream, before: i64) {
        let key = Self::key(ticker, exchange, stream);
        if let Some(mut series) = self.ticks.get_mut(&key) {
            let kept = series.split_off(&before);
            *series = kept;
        }
        self.ticks.remove_if(&key, |_, series| series.is_empty());
    }
}

impl Default for TickHistory {
    fn default() -> Self {
        Self {
            ticks: DashMap::new(),
        }
    }
}

impl RecordSource for TickHistory {
    fn name(&self) -> &str {
        "tick_history"
    }

    fn fetch_raw_records(
        &self,
        ticker: &str,
        exchange: &str,
        stream: Stream,
        window: TimeWindow,
    ) -> Result<Vec<RawRecord>> {
        let Some(series) = self.ticks.get(&Self::key(ticker, exchange, stream)) else {
            return Ok(Vec::new());
        };
        Ok(series
            .range(window.start..=window.end)
            .map(|(timestamp, value)| RawRecord {
                timestamp: *timestamp,
                value: *value,
            })
            .collect())
    }
}
