//! Bollinger bands over the last `horizon` points of a `horizon * 5`
//! lookback, tagged with the horizon.

use crate::error::{Result, StoreError};
use crate::services::subscribers::{formulas, Indicator, Window};
use crate::types::{scaled_horizons, SeriesClass, SeriesValue, SignalEvent, Trend};

const LOOKBACK_PER_HORIZON: u32 = 5;
const NBDEV: f64 = 2.0;

/// Bollinger bands with a squeeze signal.
///
/// A band width (upper - lower) below `squeeze_threshold` emits a bullish
/// signal for that horizon.
pub struct Bbands {
    windows: Vec<Window>,
    squeeze_threshold: f64,
}

impl Bbands {
    pub fn new(horizons: &[u32], squeeze_threshold: f64) -> Result<Self> {
        let windows = scaled_horizons(horizons, 1)?
            .into_iter()
            .map(|horizon| -> Result<Window> {
                let lookback = horizon
                    .horizon()
                    .checked_mul(LOOKBACK_PER_HORIZON)
                    .ok_or_else(|| StoreError::InvalidHorizon {
                        horizon: horizon.horizon(),
                        periods: horizon.periods(),
                        reason: "lookback overflows".to_string(),
                    })?;
                Ok(Window {
                    horizon,
                    tag: horizon.periods(),
                    range: lookback - 1,
                    span: horizon.horizon(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            windows,
            squeeze_threshold,
        })
    }

    pub fn squeeze_threshold(&self) -> f64 {
        self.squeeze_threshold
    }
}

impl Indicator for Bbands {
    fn name(&self) -> &str {
        "bbands"
    }

    fn series_class(&self) -> SeriesClass {
        SeriesClass::Bbands
    }

    fn windows(&self) -> &[Window] {
        &self.windows
    }

    fn compute(&self, values: &[f64], timeperiod: usize) -> SeriesValue {
        SeriesValue::Bands(formulas::bbands(values, timeperiod, NBDEV))
    }

    fn produce_signal(&self, value: &SeriesValue, window: &Window) -> Option<SignalEvent> {
        let squeeze = value.as_bands()?.width();
        (squeeze < self.squeeze_threshold).then(|| SignalEvent {
            indicator: self.name().to_string(),
            trend: Trend::Bullish,
            periods: window.tag,
            value: squeeze,
            threshold: self.squeeze_threshold,
        })
    }
}
