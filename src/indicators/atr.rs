//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), defined
//! from the second bar on. ATR is the simple mean of the last `period` true
//! ranges; it needs `period + 1` bars and reports 0 otherwise.

/// True range for bars 1..n (length n-1).
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    (1..n)
        .map(|i| {
            let (h, l, pc) = (high[i], low[i], close[i - 1]);
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        })
        .collect()
}

/// ATR at the latest bar. Zero when fewer than `period + 1` bars are given,
/// which downstream reads as "fails the volatility gate".
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> f64 {
    let tr = true_range(high, low, close);
    if period == 0 || tr.len() < period {
        return 0.0;
    }

    tr[tr.len() - period..].iter().sum::<f64>() / period as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn true_range_uses_previous_close() {
        // Bar 1: h-l = 1, |h-pc| = 3, |l-pc| = 2 → 3
        let tr = true_range(&[10.0, 13.0], &[9.0, 12.0], &[10.0, 12.5]);
        assert_eq!(tr.len(), 1);
        assert_approx(tr[0], 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_requires_period_plus_one_bars() {
        let high = [2.0, 3.0, 4.0];
        let low = [1.0, 2.0, 3.0];
        let close = [1.5, 2.5, 3.5];
        assert_eq!(atr(&high, &low, &close, 3), 0.0);
        assert!(atr(&high, &low, &close, 2) > 0.0);
    }

    #[test]
    fn atr_mean_of_trailing_ranges() {
        // Closes equal to lows so TR = max(h-l, h-pc)
        let high = [1.0, 2.0, 4.0, 7.0];
        let low = [0.0, 1.0, 3.0, 6.0];
        let close = [0.0, 1.0, 3.0, 6.0];
        // TR: [2, 3, 4] → last two mean = 3.5
        assert_approx(atr(&high, &low, &close, 2), 3.5, DEFAULT_EPSILON);
        assert_approx(atr(&high, &low, &close, 3), 3.0, DEFAULT_EPSILON);
    }
}
