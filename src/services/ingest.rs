//! Live tick ingestion.
//!
//! Ticks are appended to the tick history as they arrive. When a tick opens
//! a new 5-minute bucket for its stream, the previous bucket is resampled and
//! every index is saved, which starts the indicator cascade. Saves run on the
//! blocking pool under a timeout so one slow cascade cannot stall the feed.

use crate::services::history::{RecordSource, SqliteHistory, TickHistory};
use crate::services::resample::resample_all;
use crate::services::store::TimeSeriesStore;
use crate::types::{SeriesKey, Stream, Tick, SCORE_EPOCH};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Raw ticks older than this are dropped from the tick history.
const HISTORY_RETENTION_SECS: i64 = 2 * 86_400;

/// Ticks stamped further than this past wall-clock time are rejected.
const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Consumes ticks and closes buckets into the store.
pub struct IngestService {
    store: Arc<TimeSeriesStore>,
    history: Arc<TickHistory>,
    archive: Option<Arc<SqliteHistory>>,
    /// `{ticker}:{exchange}:{stream}` -> score of the bucket still filling.
    open_buckets: DashMap<String, i64>,
    cascade_timeout: Duration,
}

impl IngestService {
    pub fn new(
        store: Arc<TimeSeriesStore>,
        history: Arc<TickHistory>,
        archive: Option<Arc<SqliteHistory>>,
        cascade_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            history,
            archive,
            open_buckets: DashMap::new(),
            cascade_timeout,
        })
    }

    /// Bounded channel feeding [`spawn`](Self::spawn).
    pub fn channel(buffer: usize) -> (mpsc::Sender<Tick>, mpsc::Receiver<Tick>) {
        mpsc::channel(buffer.max(1))
    }

    /// Consume `rx` until every sender is dropped, then close open buckets.
    pub fn spawn(self: Arc<Self>, mut rx: mpsc::Receiver<Tick>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Ingest service started");
            while let Some(tick) = rx.recv().await {
                self.ingest(tick).await;
            }
            self.flush().await;
            info!("Ingest service stopped");
        })
    }

    /// Record one tick. Returns the score of the bucket it closed, if any.
    pub async fn ingest(&self, tick: Tick) -> Option<i64> {
        if tick.ticker.is_empty() || tick.exchange.is_empty() || !tick.value.is_finite() {
            debug!("Dropping malformed tick {:?}", tick);
            return None;
        }

        let latest_allowed = chrono::Utc::now().timestamp() + MAX_CLOCK_SKEW_SECS;
        if tick.timestamp <= SCORE_EPOCH || tick.timestamp > latest_allowed {
            warn!(
                "Dropping tick for {}@{} with out-of-range timestamp {}",
                tick.ticker, tick.exchange, tick.timestamp
            );
            return None;
        }

        if let Some(ref archive) = self.archive {
            let archive = archive.clone();
            let archived = tick.clone();
            match tokio::task::spawn_blocking(move || archive.insert(&archived)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Failed to archive tick for {}: {}", tick.ticker, e),
                Err(e) => error!("Archive task for {} failed: {}", tick.ticker, e),
            }
        }
        self.history.record(&tick);

        let bucket_key = format!("{}:{}:{}", tick.ticker, tick.exchange, tick.stream);
        let score = self.store.clock().closing_score(tick.timestamp);
        let closed = {
            let mut open = self.open_buckets.entry(bucket_key).or_insert(score);
            if *open < score {
                let previous = *open;
                *open = score;
                Some(previous)
            } else {
                None
            }
        };

        if let Some(previous) = closed {
            self.close_bucket(&tick.ticker, &tick.exchange, tick.stream, previous)
                .await;
            let closed_at = self.store.clock().timestamp_from_score(previous);
            self.history.prune(
                &tick.ticker,
                &tick.exchange,
                tick.stream,
                closed_at - HISTORY_RETENTION_SECS,
            );
        }
        closed
    }

    /// Close every bucket still filling.
    pub async fn flush(&self) {
        let open: Vec<(String, i64)> = self
            .open_buckets
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        self.open_buckets.clear();

        for (bucket_key, score) in open {
            let mut parts = bucket_key.splitn(3, ':');
            let (Some(ticker), Some(exchange), Some(stream)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let stream = match stream {
                "price" => Stream::Price,
                "volume" => Stream::Volume,
                _ => continue,
            };
            self.close_bucket(ticker, exchange, stream, score).await;
        }
    }

    /// Resample one bucket and save every index on the blocking pool.
    async fn close_bucket(&self, ticker: &str, exchange: &str, stream: Stream, score: i64) {
        let window = self.store.clock().window(score);
        let records = match self.history.fetch_raw_records(ticker, exchange, stream, window) {
            Ok(records) => records,
            Err(e) => {
                error!("Tick history read failed for {}@{}: {}", ticker, exchange, e);
                return;
            }
        };

        let mut points = Vec::new();
        for (index, value) in resample_all(stream, &records) {
            match SeriesKey::raw(ticker, exchange, index) {
                Ok(key) => points.push((key, value)),
                Err(e) => error!("{}", e),
            }
        }
        if points.is_empty() {
            return;
        }

        let store = self.store.clone();
        let save = tokio::task::spawn_blocking(move || {
            for (key, value) in points {
                if let Err(e) = store.save_at_score(&key, score, value) {
                    warn!("Failed to save {} at score {}: {}", key, score, e);
                }
            }
        });

        match tokio::time::timeout(self.cascade_timeout, save).await {
            Ok(Ok(())) => debug!("Closed {} bucket {} for {}@{}", stream, score, ticker, exchange),
            Ok(Err(e)) => error!("Save task for {}@{} failed: {}", ticker, exchange, e),
            Err(_) => warn!(
                "Cascade for {}@{} score {} exceeded {:?}; continuing in background",
                ticker, exchange, score, self.cascade_timeout
            ),
        }
    }
}
