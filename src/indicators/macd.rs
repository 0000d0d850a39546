//! Moving Average Convergence/Divergence (MACD).
//!
//! line = EMA(fast) - EMA(slow); signal = EMA(line, signal_span);
//! histogram = line - signal. A zero-crossing of the histogram is the
//! momentum trigger.

use super::ema;

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(series: &[f64], fast: usize, slow: usize, signal_span: usize) -> Macd {
    let fast_ema = ema(series, fast);
    let slow_ema = ema(series, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal_span);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    Macd {
        line,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, last_crossing, Cross, DEFAULT_EPSILON};

    #[test]
    fn macd_lengths_match_input() {
        let series: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).sin()).collect();
        let result = macd(&series, 12, 26, 9);
        assert_eq!(result.line.len(), 40);
        assert_eq!(result.signal.len(), 40);
        assert_eq!(result.histogram.len(), 40);
    }

    #[test]
    fn macd_starts_at_zero() {
        let result = macd(&[3.0, 4.0, 5.0], 12, 26, 9);
        assert_approx(result.line[0], 0.0, DEFAULT_EPSILON);
        assert_approx(result.histogram[0], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn macd_histogram_turns_positive_on_first_rise() {
        // Flat then up: histogram goes 0 → positive on the first rising bar.
        let result = macd(&[10.0, 10.0, 10.0, 11.0], 3, 6, 3);
        assert_eq!(last_crossing(&result.histogram), Cross::Bullish);
    }
}
