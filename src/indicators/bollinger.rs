//! Bollinger Bands: rolling mean +/- k rolling standard deviations.
//!
//! Uses the sample standard deviation (divide by N-1) of the trailing
//! `period` values. Only the latest bar's bands are needed by the strategies.

use statrs::statistics::Statistics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

/// Bands at the latest bar, or `None` when fewer than `period` values exist
/// or `period < 2` (no sample deviation).
pub fn bollinger(series: &[f64], period: usize, k: f64) -> Option<BollingerBands> {
    if period < 2 || series.len() < period {
        return None;
    }

    let window = &series[series.len() - period..];
    let middle = window.iter().mean();
    let std_dev = window.iter().std_dev();

    Some(BollingerBands {
        lower: middle - k * std_dev,
        middle,
        upper: middle + k * std_dev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn bollinger_short_series() {
        assert!(bollinger(&[1.0, 2.0], 3, 2.0).is_none());
        assert!(bollinger(&[1.0, 2.0], 1, 2.0).is_none());
    }

    #[test]
    fn bollinger_known_values() {
        // Trailing window 2, 4, 6: mean 4, sample std 2
        let bands = bollinger(&[100.0, 2.0, 4.0, 6.0], 3, 2.0).unwrap();
        assert_approx(bands.middle, 4.0, DEFAULT_EPSILON);
        assert_approx(bands.upper, 8.0, DEFAULT_EPSILON);
        assert_approx(bands.lower, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_flat_series_collapses() {
        let bands = bollinger(&[5.0; 20], 20, 2.0).unwrap();
        assert_approx(bands.upper, 5.0, DEFAULT_EPSILON);
        assert_approx(bands.lower, 5.0, DEFAULT_EPSILON);
    }
}
