//! Momentum: change of the close price over `horizon * 10` periods.

use crate::error::Result;
use crate::services::subscribers::{formulas, Indicator, Window};
use crate::types::{scaled_horizons, SeriesClass, SeriesValue};

const PERIODS_PER_HORIZON: u32 = 10;

pub struct Momentum {
    windows: Vec<Window>,
}

impl Momentum {
    pub fn new(horizons: &[u32]) -> Result<Self> {
        let windows = scaled_horizons(horizons, PERIODS_PER_HORIZON)?
            .into_iter()
            .map(|horizon| Window {
                horizon,
                tag: horizon.periods(),
                range: horizon.periods(),
                span: horizon.periods(),
            })
            .collect();
        Ok(Self { windows })
    }
}

impl Indicator for Momentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn series_class(&self) -> SeriesClass {
        SeriesClass::Momentum
    }

    fn windows(&self) -> &[Window] {
        &self.windows
    }

    fn compute(&self, values: &[f64], timeperiod: usize) -> SeriesValue {
        SeriesValue::Scalar(formulas::momentum(values, timeperiod))
    }
}
