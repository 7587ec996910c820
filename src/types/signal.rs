use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
        }
    }
}

/// Directional signal produced by an indicator rule.
///
/// Stored in the `signal` class under index = producing indicator and
/// suffix = periods, at the score of the computation that produced it.
/// Carries no wall-clock fields so that recomputing the same inputs yields an
/// identical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub indicator: String,
    pub trend: Trend,
    pub periods: u32,
    /// Metric the rule evaluated (band width, RSI level, ...).
    pub value: f64,
    pub threshold: f64,
}
