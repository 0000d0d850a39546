//! Pure indicator transforms over chronological price series.
//!
//! Every function here is deterministic and reads only its arguments; callers
//! enforce minimum window lengths. Series-valued indicators return one value
//! per input bar so strategies can compare the current and previous bar.

mod atr;
mod bollinger;
mod ema;
mod macd;
mod rsi;

pub use atr::atr;
pub use bollinger::bollinger;
pub use ema::ema;
pub use macd::macd;
pub use rsi::rsi;

/// Direction of a zero-crossing between two consecutive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    Bullish,
    Bearish,
    None,
}

impl Cross {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cross::Bullish => "Bull",
            Cross::Bearish => "Bear",
            Cross::None => "None",
        }
    }
}

/// Classify the move of a difference series from `prev` to `cur`.
///
/// Bullish: `prev <= 0` and `cur > 0`. Bearish: `prev >= 0` and `cur < 0`.
/// A persisting sign is not a crossing.
pub fn crossing(prev: f64, cur: f64) -> Cross {
    if prev <= 0.0 && cur > 0.0 {
        Cross::Bullish
    } else if prev >= 0.0 && cur < 0.0 {
        Cross::Bearish
    } else {
        Cross::None
    }
}

/// Crossing of the last two values of `diff`, if it has two.
pub fn last_crossing(diff: &[f64]) -> Cross {
    match diff {
        [.., prev, cur] => crossing(*prev, *cur),
        _ => Cross::None,
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
