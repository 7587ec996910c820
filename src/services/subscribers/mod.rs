//! Indicator subscribers.
//!
//! Every indicator follows the same per-horizon pattern: query the upstream
//! series ending at the notified score, cap the formula's timeperiod at the
//! number of points actually present, reject degenerate results, save the
//! value tagged with its periods and optionally emit a signal.

pub mod bbands;
pub mod formulas;
pub mod momentum;
pub mod moving_average;
pub mod rsi;

pub use bbands::Bbands;
pub use momentum::Momentum;
pub use moving_average::{MovingAverage, MovingAverageKind};
pub use rsi::Rsi;

use crate::config::IndicatorConfig;
use crate::error::{Result, StoreError};
use crate::services::dispatcher::{Notification, Subscriber, SubscriberRegistry};
use crate::services::store::TimeSeriesStore;
use crate::types::{Horizon, SeriesClass, SeriesValue, SignalEvent, CLOSE_PRICE};
use std::sync::Arc;
use tracing::{debug, info};

/// One computation of an indicator per notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub horizon: Horizon,
    /// Suffix the result is saved under.
    pub tag: u32,
    /// `periods_range` of the upstream query.
    pub range: u32,
    /// Upper bound for the formula's timeperiod.
    pub span: u32,
}

/// A technical indicator computed over an upstream scalar series.
pub trait Indicator: Send + Sync {
    /// Unique name; also the signal index.
    fn name(&self) -> &str;

    /// Class the computed values are saved under.
    fn series_class(&self) -> SeriesClass;

    fn windows(&self) -> &[Window];

    /// Compute over `values` (oldest first). May return NaN-bearing values,
    /// which are rejected by the caller.
    fn compute(&self, values: &[f64], timeperiod: usize) -> SeriesValue;

    /// Optional signal rule evaluated on a freshly computed value.
    fn produce_signal(&self, _value: &SeriesValue, _window: &Window) -> Option<SignalEvent> {
        None
    }
}

/// Adapts an [`Indicator`] into a [`Subscriber`] of one raw index.
pub struct IndicatorSubscriber<I> {
    indicator: I,
    index: String,
    watches: [SeriesClass; 1],
    outputs: [SeriesClass; 2],
}

impl<I: Indicator> IndicatorSubscriber<I> {
    /// Subscribe to `close_price` writes.
    pub fn new(indicator: I) -> Self {
        Self::on_index(indicator, SeriesClass::Price, CLOSE_PRICE)
    }

    pub fn on_index(indicator: I, watched: SeriesClass, index: &str) -> Self {
        let outputs = [indicator.series_class(), SeriesClass::Signal];
        Self {
            indicator,
            index: index.to_string(),
            watches: [watched],
            outputs,
        }
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}

impl<I: Indicator> Subscriber for IndicatorSubscriber<I> {
    fn name(&self) -> &str {
        self.indicator.name()
    }

    fn watches(&self) -> &[SeriesClass] {
        &self.watches
    }

    fn index_filter(&self) -> Option<&str> {
        Some(&self.index)
    }

    fn outputs(&self) -> &[SeriesClass] {
        &self.outputs
    }

    fn handle(&self, store: &TimeSeriesStore, note: &Notification) -> Result<()> {
        if note.key.index != self.index {
            debug!(
                "index {} is not `{}` ...ignoring...",
                note.key.index, self.index
            );
            return Ok(());
        }

        let name = self.indicator.name();
        let mut failures = Vec::new();

        for window in self.indicator.windows() {
            let history = store.query_score(&note.key, note.score, 0, window.range);
            let values = history.scalars();
            let timeperiod = values.len().min(window.span as usize);
            let value = self.indicator.compute(&values, timeperiod);

            if !value.is_defined() {
                debug!(
                    "{} for {} on {} periods is degenerate with {} points, not saved",
                    name,
                    note.key.ticker,
                    window.tag,
                    values.len()
                );
                continue;
            }

            let key = note.key.derive(self.indicator.series_class(), &note.key.index, window.tag);
            debug!("saving {} for {} on {} periods", name, note.key.ticker, window.tag);
            if let Err(e) = store.save_at_score(&key, note.score, value.clone()) {
                failures.push(e.to_string());
                continue;
            }

            if let Some(signal) = self.indicator.produce_signal(&value, window) {
                let signal_key = note.key.derive(SeriesClass::Signal, name, window.tag);
                info!(
                    "{} {} signal for {} on {} periods ({} vs {})",
                    signal.trend, name, note.key.ticker, window.tag, signal.value, signal.threshold
                );
                if let Err(e) = store.save_at_score(&signal_key, note.score, signal) {
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Subscriber {
                name: name.to_string(),
                message: failures.join("; "),
            })
        }
    }
}

/// Build the startup registry of all indicator subscribers.
///
/// Fails with `InvalidHorizon` when a configured horizon is unusable.
pub fn build_registry(config: &IndicatorConfig) -> Result<SubscriberRegistry> {
    let mut registry = SubscriberRegistry::new();
    let subscribers: Vec<Arc<dyn Subscriber>> = vec![
        Arc::new(IndicatorSubscriber::new(Momentum::new(&config.horizons)?)),
        Arc::new(IndicatorSubscriber::new(Bbands::new(
            &config.horizons,
            config.squeeze_threshold,
        )?)),
        Arc::new(IndicatorSubscriber::new(MovingAverage::new(
            MovingAverageKind::Simple,
            &config.horizons,
            &config.sma_multipliers,
        )?)),
        Arc::new(IndicatorSubscriber::new(MovingAverage::new(
            MovingAverageKind::Exponential,
            &config.horizons,
            &config.ema_multipliers,
        )?)),
        Arc::new(IndicatorSubscriber::new(Rsi::new(
            &config.horizons,
            config.rsi_oversold,
            config.rsi_overbought,
        )?)),
    ];

    for subscriber in subscribers {
        registry.register(subscriber)?;
    }
    Ok(registry)
}
