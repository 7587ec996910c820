//! Numeric indicator formulas over a slice of values ordered oldest first.
//!
//! Each function computes the value for the last element using `timeperiod`
//! values of history and returns NaN when the slice is too short, so callers
//! can reject degenerate results instead of persisting them.

use crate::types::BandsValue;

/// `values[last] - values[last - timeperiod]`.
pub fn momentum(values: &[f64], timeperiod: usize) -> f64 {
    if timeperiod == 0 || values.len() <= timeperiod {
        return f64::NAN;
    }
    let last = values.len() - 1;
    values[last] - values[last - timeperiod]
}

/// Mean of the last `timeperiod` values.
pub fn sma(values: &[f64], timeperiod: usize) -> f64 {
    if timeperiod < 2 || values.len() < timeperiod {
        return f64::NAN;
    }
    values[values.len() - timeperiod..].iter().sum::<f64>() / timeperiod as f64
}

/// Exponential moving average seeded with the SMA of the first `timeperiod` values.
pub fn ema(values: &[f64], timeperiod: usize) -> f64 {
    if timeperiod < 2 || values.len() < timeperiod {
        return f64::NAN;
    }
    let multiplier = 2.0 / (timeperiod as f64 + 1.0);
    let seed = values[..timeperiod].iter().sum::<f64>() / timeperiod as f64;
    values[timeperiod..]
        .iter()
        .fold(seed, |ema, value| (value - ema) * multiplier + ema)
}

/// Population standard deviation of the last `timeperiod` values.
pub fn std_dev(values: &[f64], timeperiod: usize) -> f64 {
    let mean = sma(values, timeperiod);
    if mean.is_nan() {
        return f64::NAN;
    }
    let window = &values[values.len() - timeperiod..];
    let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / timeperiod as f64;
    variance.sqrt()
}

/// Bollinger bands: `mean ± nbdev * stddev` over the last `timeperiod` values.
pub fn bbands(values: &[f64], timeperiod: usize, nbdev: f64) -> BandsValue {
    let middle = sma(values, timeperiod);
    let deviation = std_dev(values, timeperiod);
    BandsValue {
        upper: middle + nbdev * deviation,
        middle,
        lower: middle - nbdev * deviation,
    }
}

/// Wilder's RSI in `[0, 100]`; needs `timeperiod + 1` values.
pub fn rsi(values: &[f64], timeperiod: usize) -> f64 {
    if timeperiod == 0 || values.len() <= timeperiod {
        return f64::NAN;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = values
        .windows(2)
        .map(|pair| {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            }
        })
        .unzip();

    let period = timeperiod as f64;
    let mut avg_gain = gains[..timeperiod].iter().sum::<f64>() / period;
    let mut avg_loss = losses[..timeperiod].iter().sum::<f64>() / period;
    for i in timeperiod..gains.len() {
        avg_gain = (avg_gain * (period - 1.0) + gains[i]) / period;
        avg_loss = (avg_loss * (period - 1.0) + losses[i]) / period;
    }

    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
