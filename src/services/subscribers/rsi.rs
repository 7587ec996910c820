//! Relative Strength Index over `horizon * 14` periods.

use crate::error::Result;
use crate::services::subscribers::{formulas, Indicator, Window};
use crate::types::{scaled_horizons, SeriesClass, SeriesValue, SignalEvent, Trend};

const PERIODS_PER_HORIZON: u32 = 14;

/// RSI with an oversold/overbought signal rule.
///
/// - Below `oversold`: bullish
/// - Above `overbought`: bearish
pub struct Rsi {
    windows: Vec<Window>,
    oversold: f64,
    overbought: f64,
}

impl Rsi {
    pub fn new(horizons: &[u32], oversold: f64, overbought: f64) -> Result<Self> {
        let windows = scaled_horizons(horizons, PERIODS_PER_HORIZON)?
            .into_iter()
            .map(|horizon| Window {
                horizon,
                tag: horizon.periods(),
                range: horizon.periods(),
                span: horizon.periods(),
            })
            .collect();
        Ok(Self {
            windows,
            oversold,
            overbought,
        })
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn series_class(&self) -> SeriesClass {
        SeriesClass::Rsi
    }

    fn windows(&self) -> &[Window] {
        &self.windows
    }

    fn compute(&self, values: &[f64], timeperiod: usize) -> SeriesValue {
        SeriesValue::Scalar(formulas::rsi(values, timeperiod))
    }

    fn produce_signal(&self, value: &SeriesValue, window: &Window) -> Option<SignalEvent> {
        let rsi = value.as_f64()?;
        let (trend, threshold) = if rsi < self.oversold {
            (Trend::Bullish, self.oversold)
        } else if rsi > self.overbought {
            (Trend::Bearish, self.overbought)
        } else {
            return None;
        };
        Some(SignalEvent {
            indicator: self.name().to_string(),
            trend,
            periods: window.tag,
            value: rsi,
            threshold,
        })
    }
}
