use crate::types::{SeriesKey, SignalEvent};
use serde::{Deserialize, Serialize};

/// Bollinger band triple stored as one value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandsValue {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandsValue {
    /// Distance between the outer bands.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Value held at one score of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValue {
    Scalar(f64),
    Bands(BandsValue),
    Signal(SignalEvent),
}

impl SeriesValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bands(&self) -> Option<&BandsValue> {
        match self {
            Self::Bands(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&SignalEvent> {
        match self {
            Self::Signal(s) => Some(s),
            _ => None,
        }
    }

    /// False for NaN/infinite numbers, which stand for "no value".
    pub fn is_defined(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Bands(b) => b.upper.is_finite() && b.middle.is_finite() && b.lower.is_finite(),
            Self::Signal(s) => s.value.is_finite(),
        }
    }
}

impl From<f64> for SeriesValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<BandsValue> for SeriesValue {
    fn from(value: BandsValue) -> Self {
        Self::Bands(value)
    }
}

impl From<SignalEvent> for SeriesValue {
    fn from(value: SignalEvent) -> Self {
        Self::Signal(value)
    }
}

/// One entry of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub score: i64,
    pub value: SeriesValue,
}

/// Result of a range query. `count == 0` means "no data" and is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub key: String,
    pub values: Vec<SeriesValue>,
    pub scores: Vec<i64>,
    pub count: usize,
    pub earliest_timestamp: Option<i64>,
    pub latest_timestamp: Option<i64>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Scalar values in score order, skipping non-scalar entries.
    pub fn scalars(&self) -> Vec<f64> {
        self.values.iter().filter_map(SeriesValue::as_f64).collect()
    }

    pub fn last(&self) -> Option<(i64, &SeriesValue)> {
        Some((*self.scores.last()?, self.values.last()?))
    }
}

/// Query parameters as received from downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesQuery {
    pub key: SeriesKey,
    pub timestamp: i64,
    #[serde(default)]
    pub tolerance: u32,
    #[serde(default)]
    pub periods_range: u32,
}
