//! Resampling of raw ticks into 5-minute price and volume indexes.

use crate::types::{RawRecord, Stream};

/// Value of `index` over `records` (ordered by timestamp).
///
/// Returns `None` for an empty bucket or an index that is not a raw index.
pub fn resample(index: &str, records: &[RawRecord]) -> Option<f64> {
    let first = records.first()?.value;
    let last = records.last()?.value;
    let high = records.iter().map(|r| r.value).fold(f64::NEG_INFINITY, f64::max);
    let low = records.iter().map(|r| r.value).fold(f64::INFINITY, f64::min);
    let mean = records.iter().map(|r| r.value).sum::<f64>() / records.len() as f64;

    let value = match index {
        "open_price" | "open_volume" => first,
        "close_price" | "close_volume" => last,
        "high_price" | "high_volume" => high,
        "low_price" | "low_volume" => low,
        "midpoint_price" => (high + low) / 2.0,
        "mean_price" => mean,
        "price_variance" => {
            records.iter().map(|r| (r.value - mean).powi(2)).sum::<f64>() / records.len() as f64
        }
        _ => return None,
    };
    Some(value)
}

/// Every index of `stream` resampled from one bucket of records.
pub fn resample_all(stream: Stream, records: &[RawRecord]) -> Vec<(&'static str, f64)> {
    let indexes = stream.series_class().indexes().unwrap_or(&[]);
    indexes
        .iter()
        .filter_map(|index| resample(index, records).map(|value| (*index, value)))
        .collect()
}
