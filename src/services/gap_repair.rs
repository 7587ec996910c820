//! Detection and repair of missing points in raw price/volume series.
//!
//! Each missing score is tried against an ordered list of strategies:
//! reconstruct from the companion tick history, and if that fails, replay the
//! bulk archive's records for the score's window into the tick history and
//! reconstruct once more. At most [`MAX_ATTEMPTS`] reconstructions are made
//! per score, after which the score is recorded as irreparable.

use crate::config::RepairConfig;
use crate::error::{Result, StoreError};
use crate::services::history::{RecordSource, TickHistory};
use crate::services::resample::resample;
use crate::services::store::TimeSeriesStore;
use crate::types::{
    GapRecord, GapStatus, RepairReport, SeriesKey, Stream, CLOSE_PRICE, CLOSE_VOLUME,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Reconstruction attempts per score.
pub const MAX_ATTEMPTS: usize = 2;

/// Most recent scores left alone by the periodic job; live ingest may still
/// be closing them.
const SETTLE_SCORES: i64 = 2;

/// Repair strategies in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Resample from the companion tick history.
    Companion,
    /// Replay the bulk archive into the tick history, then resample again.
    Backlog,
}

const STRATEGIES: [Strategy; MAX_ATTEMPTS] = [Strategy::Companion, Strategy::Backlog];

enum Reconstruction {
    Saved,
    AlreadyPresent,
    Missing,
}

/// Finds and plugs holes in raw series.
pub struct GapRepairer {
    store: Arc<TimeSeriesStore>,
    companion: Arc<TickHistory>,
    backlog: Option<Arc<dyn RecordSource>>,
}

impl GapRepairer {
    pub fn new(
        store: Arc<TimeSeriesStore>,
        companion: Arc<TickHistory>,
        backlog: Option<Arc<dyn RecordSource>>,
    ) -> Self {
        Self {
            store,
            companion,
            backlog,
        }
    }

    /// Scores in `[start_score, end_score]` that remain missing after repair.
    /// An empty list means the range is fully healed.
    pub fn find_gaps(&self, key: &SeriesKey, start_score: i64, end_score: i64) -> Result<Vec<i64>> {
        Ok(self.scan(key, start_score, end_score)?.unrepaired())
    }

    /// Walk `[start_score, end_score]` one quantum at a time, repairing what
    /// can be repaired.
    pub fn scan(&self, key: &SeriesKey, start_score: i64, end_score: i64) -> Result<RepairReport> {
        let stream = Self::repairable_stream(key)?;
        let mut report = RepairReport::new(key.clone(), start_score, end_score);

        for score in start_score..=end_score {
            report.scanned += 1;
            if self.store.query_score(key, score, 0, 0).count > 0 {
                continue;
            }

            let mut record = GapRecord {
                key: key.clone(),
                score,
                status: GapStatus::Pending,
            };
            match self.repair_score(key, stream, score) {
                Some(status) => record.status = status,
                None => continue,
            }

            if record.status == GapStatus::Irreparable {
                warn!("Could not repair {} at score {}", key, score);
            }
            report.records.push(record);
        }

        info!(
            "Scanned {} scores of {}: {} repaired, {} irreparable",
            report.scanned,
            key,
            report.repaired().len(),
            report.unrepaired().len()
        );
        Ok(report)
    }

    /// Run the strategies for one missing score. `None` when the score turned
    /// out to be filled by another writer in the meantime.
    fn repair_score(&self, key: &SeriesKey, stream: Stream, score: i64) -> Option<GapStatus> {
        let mut replayed = false;

        for strategy in STRATEGIES {
            if strategy == Strategy::Backlog {
                if self.replay_backlog(key, stream, score) == 0 {
                    break;
                }
                replayed = true;
            }

            match self.reconstruct(key, stream, score) {
                Reconstruction::Saved if replayed => return Some(GapStatus::RepairedFromSource),
                Reconstruction::Saved => return Some(GapStatus::RepairedFromCache),
                Reconstruction::AlreadyPresent => return None,
                Reconstruction::Missing => {
                    debug!("{:?} could not rebuild {} at score {}", strategy, key, score);
                }
            }
        }

        Some(GapStatus::Irreparable)
    }

    /// Resample the score's window from the tick history and save it.
    fn reconstruct(&self, key: &SeriesKey, stream: Stream, score: i64) -> Reconstruction {
        let window = self.store.clock().window(score);
        let records = match self
            .companion
            .fetch_raw_records(&key.ticker, &key.exchange, stream, window)
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Tick history read failed for {}: {}", key, e);
                return Reconstruction::Missing;
            }
        };

        let Some(value) = resample(&key.index, &records) else {
            return Reconstruction::Missing;
        };

        match self.store.save_at_score(key, score, value) {
            Ok(outcome) if outcome.is_inserted() => {
                debug!("Restored {} at score {} from tick history", key, score);
                Reconstruction::Saved
            }
            Ok(_) => Reconstruction::AlreadyPresent,
            Err(StoreError::DuplicateScore { .. }) => {
                debug!("{} at score {} was written concurrently", key, score);
                Reconstruction::AlreadyPresent
            }
            Err(e) => {
                error!("Failed to save repaired {} at score {}: {}", key, score, e);
                Reconstruction::Missing
            }
        }
    }

    /// Copy the archive's records for the score's window into the tick
    /// history. Returns how many new records were replayed.
    fn replay_backlog(&self, key: &SeriesKey, stream: Stream, score: i64) -> usize {
        let Some(ref backlog) = self.backlog else {
            return 0;
        };
        let window = self.store.clock().window(score);
        match backlog.fetch_raw_records(&key.ticker, &key.exchange, stream, window) {
            Ok(records) => {
                let saved = self
                    .companion
                    .replay(&key.ticker, &key.exchange, stream, &records);
                if saved > 0 {
                    debug!(
                        "Restored {} records for {} from {}",
                        saved,
                        key,
                        backlog.name()
                    );
                }
                saved
            }
            Err(e) => {
                warn!("{} read failed for {}: {}", backlog.name(), key, e);
                0
            }
        }
    }

    /// Forward-fill `scores` from the point exactly one quantum earlier.
    ///
    /// Scores that already hold a value are skipped. Fails with a
    /// consistency error, leaving later scores untouched, when the preceding
    /// point is absent.
    pub fn force_fill(&self, key: &SeriesKey, scores: &[i64]) -> Result<Vec<GapRecord>> {
        Self::repairable_stream(key)?;
        let mut filled = Vec::new();

        for &score in scores {
            let response = self.store.query_score(key, score, 0, 1);
            if response.scores.last() == Some(&score) {
                continue;
            }

            let previous = score - 1;
            let value = match response.last() {
                Some((found, value)) if found == previous => value.clone(),
                _ => {
                    return Err(StoreError::Consistency(format!(
                        "cannot forward-fill {} at score {}: no point at score {}",
                        key, score, previous
                    )))
                }
            };

            self.store.save_at_score(key, score, value)?;
            debug!("Filled the gap on score {} of {}", score, key);
            filled.push(GapRecord {
                key: key.clone(),
                score,
                status: GapStatus::ForwardFilled,
            });
        }

        Ok(filled)
    }

    /// Scan the recent past of every watched pair's close price and volume.
    pub fn heal_recent(&self, config: &RepairConfig, now: i64) -> Vec<RepairReport> {
        let end_score = self.store.clock().score_from_timestamp(now) - SETTLE_SCORES;
        let start_score = end_score - config.lookback_scores + 1;
        let mut reports = Vec::new();

        for pair in &config.watched_pairs {
            for index in [CLOSE_PRICE, CLOSE_VOLUME] {
                let key = match SeriesKey::raw(&pair.ticker, &pair.exchange, index) {
                    Ok(key) => key,
                    Err(e) => {
                        error!("Skipping {}@{}: {}", pair.ticker, pair.exchange, e);
                        continue;
                    }
                };
                match self.scan(&key, start_score, end_score) {
                    Ok(report) => reports.push(report),
                    Err(e) => error!("Repair of {} failed: {}", key, e),
                }
            }
        }

        reports
    }

    fn repairable_stream(key: &SeriesKey) -> Result<Stream> {
        key.validate()?;
        match (key.series_class.stream(), Stream::for_index(&key.index)) {
            (Some(class_stream), Some(index_stream)) if class_stream == index_stream => {
                Ok(class_stream)
            }
            _ => Err(StoreError::UnsupportedRepair(key.to_string())),
        }
    }
}

/// Run [`GapRepairer::heal_recent`] every `interval_secs`.
pub fn spawn_repair_job(repairer: Arc<GapRepairer>, config: RepairConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        loop {
            interval.tick().await;
            let repairer = repairer.clone();
            let config = config.clone();
            let run = tokio::task::spawn_blocking(move || {
                repairer.heal_recent(&config, chrono::Utc::now().timestamp())
            })
            .await;

            match run {
                Ok(reports) => {
                    let irreparable: usize = reports.iter().map(|r| r.unrepaired().len()).sum();
                    if irreparable > 0 {
                        warn!("Gap repair left {} irreparable scores", irreparable);
                    } else {
                        debug!("Gap repair healed {} series", reports.len());
                    }
                }
                Err(e) => error!("Gap repair task failed: {}", e),
            }
        }
    })
}
