//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2/(span+1).
//! Seed: EMA[0] = x[0]. No warm-up is discarded, so short series simply
//! converge slowly.

/// EMA of `series`, one output per input.
pub fn ema(series: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut result = Vec::with_capacity(series.len());

    let mut iter = series.iter();
    let Some(&seed) = iter.next() else {
        return result;
    };

    result.push(seed);
    let mut prev = seed;
    for &x in iter {
        let value = alpha * x + (1.0 - alpha) * prev;
        result.push(value);
        prev = value;
    }

    result
}
