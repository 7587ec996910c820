//! Simple and exponential moving averages.

use crate::error::Result;
use crate::services::subscribers::{formulas, Indicator, Window};
use crate::types::{scaled_horizons, SeriesClass, SeriesValue};

/// History an EMA queries, in multiples of its periods: the first `periods`
/// points seed the average, the rest are smoothed into it.
const EMA_HISTORY_MULTIPLE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovingAverageKind {
    Simple,
    Exponential,
}

/// Rolling mean over `horizon * multiplier` periods, one window per pair.
pub struct MovingAverage {
    kind: MovingAverageKind,
    windows: Vec<Window>,
}

impl MovingAverage {
    pub fn new(kind: MovingAverageKind, horizons: &[u32], multipliers: &[u32]) -> Result<Self> {
        let mut windows = Vec::with_capacity(horizons.len() * multipliers.len());
        for &multiplier in multipliers {
            for horizon in scaled_horizons(horizons, multiplier)? {
                let history = match kind {
                    MovingAverageKind::Simple => horizon.periods(),
                    MovingAverageKind::Exponential => {
                        horizon.periods().saturating_mul(EMA_HISTORY_MULTIPLE)
                    }
                };
                windows.push(Window {
                    horizon,
                    tag: horizon.periods(),
                    range: history - 1,
                    span: horizon.periods(),
                });
            }
        }
        // Distinct (horizon, multiplier) pairs can land on the same periods.
        windows.sort_by_key(|w| w.tag);
        windows.dedup_by_key(|w| w.tag);
        Ok(Self { kind, windows })
    }

    pub fn kind(&self) -> MovingAverageKind {
        self.kind
    }
}

impl Indicator for MovingAverage {
    fn name(&self) -> &str {
        match self.kind {
            MovingAverageKind::Simple => "sma",
            MovingAverageKind::Exponential => "ema",
        }
    }

    fn series_class(&self) -> SeriesClass {
        match self.kind {
            MovingAverageKind::Simple => SeriesClass::Sma,
            MovingAverageKind::Exponential => SeriesClass::Ema,
        }
    }

    fn windows(&self) -> &[Window] {
        &self.windows
    }

    fn compute(&self, values: &[f64], timeperiod: usize) -> SeriesValue {
        let value = match self.kind {
            MovingAverageKind::Simple => formulas::sma(values, timeperiod),
            MovingAverageKind::Exponential => formulas::ema(values, timeperiod),
        };
        SeriesValue::Scalar(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_periods_are_deduplicated() {
        let sma = MovingAverage::new(MovingAverageKind::Simple, &[1, 2], &[2, 4]).unwrap();
        let tags: Vec<u32> = sma.windows().iter().map(|w| w.tag).collect();
        assert_eq!(tags, vec![2, 4, 8]);
    }

    #[test]
    fn test_ema_queries_history_beyond_its_seed() {
        let sma = MovingAverage::new(MovingAverageKind::Simple, &[1], &[4]).unwrap();
        let ema = MovingAverage::new(MovingAverageKind::Exponential, &[1], &[4]).unwrap();
        assert_eq!((sma.windows()[0].range, sma.windows()[0].span), (3, 4));
        assert_eq!((ema.windows()[0].range, ema.windows()[0].span), (7, 4));

        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 10.0];
        let simple = sma.compute(&values[4..], 4).as_f64().unwrap();
        let exponential = ema.compute(&values, 4).as_f64().unwrap();
        assert_eq!(simple, 3.25);
        assert!((exponential - 4.6).abs() < 1e-9, "ema was {}", exponential);
    }

    #[test]
    fn test_names_follow_kind() {
        let ema = MovingAverage::new(MovingAverageKind::Exponential, &[1], &[3]).unwrap();
        assert_eq!(ema.name(), "ema");
        assert_eq!(ema.series_class(), SeriesClass::Ema);
    }
}
