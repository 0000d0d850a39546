//! Relative Strength Index (RSI).
//!
//! Simple rolling means of positive and negative close-to-close deltas over
//! the trailing `period` deltas:
//! RSI = 100 - 100 / (1 + avg_up / avg_down).
//! Edge cases: fewer than `period` deltas → undefined; avg_down == 0 → 100.

/// RSI at the latest bar, or `None` when the window is too short.
pub fn rsi(series: &[f64], period: usize) -> Option<f64> {
    if period == 0 || series.len() < period + 1 {
        return None;
    }

    let tail = &series[series.len() - period - 1..];
    let (mut up, mut down) = (0.0, 0.0);
    for pair in tail.windows(2) {
        let delta = pair[1] - pair[0];
        if delta > 0.0 {
            up += delta;
        } else {
            down -= delta;
        }
    }

    let avg_up = up / period as f64;
    let avg_down = down / period as f64;

    if avg_down == 0.0 {
        return Some(100.0);
    }

    Some(100.0 - 100.0 / (1.0 + avg_up / avg_down))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn rsi_insufficient_deltas() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0], 3), None);
        assert_eq!(rsi(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn rsi_all_gains_is_max() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0, 4.0], 3), Some(100.0));
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let value = rsi(&[4.0, 3.0, 2.0, 1.0], 3).unwrap();
        assert_approx(value, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_known_value() {
        // Deltas over the trailing 4: +2, -1, +1, -2 → avg_up 0.75, avg_down 0.75 → 50
        let value = rsi(&[100.0, 10.0, 12.0, 11.0, 12.0, 10.0], 4).unwrap();
        assert_approx(value, 50.0, DEFAULT_EPSILON);

        // Deltas: +3, -1 → avg_up 1.5, avg_down 0.5 → rs 3 → 75
        let value = rsi(&[10.0, 13.0, 12.0], 2).unwrap();
        assert_approx(value, 75.0, DEFAULT_EPSILON);
    }
}
