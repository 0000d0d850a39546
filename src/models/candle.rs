//! OHLC bars and the bounded, time-ordered window the strategies read.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single aggregated price bar. Immutable once received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(deserialize_with = "lenient_f64")]
    pub open: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub close: f64,

    /// Bar open time, seconds since the Unix epoch
    pub epoch: i64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, epoch: i64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            epoch,
        }
    }

    /// Bar open time as a UTC instant.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.epoch, 0).single()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Accepts either a JSON number or a numeric string.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Chronological sequence of candles with unique timestamps and a capacity.
///
/// A window shorter than a strategy's minimum is a normal "insufficient data"
/// state, checked with [`CandleWindow::has_at_least`].
#[derive(Debug, Clone, Default)]
pub struct CandleWindow {
    candles: Vec<Candle>,
}

impl CandleWindow {
    /// Build a window from bars in any order, keeping at most `capacity` of the
    /// most recent ones. Duplicate epochs keep the last one received and
    /// non-finite bars are dropped.
    pub fn new(mut candles: Vec<Candle>, capacity: usize) -> Self {
        candles.retain(Candle::is_finite);
        // Stable sort keeps arrival order among equal epochs.
        candles.sort_by_key(|c| c.epoch);

        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.epoch == candle.epoch => *last = candle,
                _ => deduped.push(candle),
            }
        }

        if deduped.len() > capacity {
            deduped.drain(..deduped.len() - capacity);
        }

        Self { candles: deduped }
    }

    /// Window without a capacity bound.
    pub fn from_candles(candles: Vec<Candle>) -> Self {
        let capacity = candles.len();
        Self::new(candles, capacity)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn has_at_least(&self, min_len: usize) -> bool {
        self.candles.len() >= min_len
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Current and previous bar, if the window holds two.
    pub fn last_two(&self) -> Option<(&Candle, &Candle)> {
        match self.candles.as_slice() {
            [.., prev, cur] => Some((prev, cur)),
            _ => None,
        }
    }

    /// The most recent `n` bars (fewer if the window is shorter).
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64, epoch: i64) -> Candle {
        Candle::new(close, close + 0.5, close - 0.5, close, epoch)
    }

    #[test]
    fn test_window_sorts_and_dedups() {
        let window = CandleWindow::from_candles(vec![
            bar(3.0, 180),
            bar(1.0, 60),
            bar(2.0, 120),
            bar(2.5, 120),
        ]);

        assert_eq!(window.len(), 3);
        assert_eq!(window.closes(), vec![1.0, 2.5, 3.0]);
    }

    #[test]
    fn test_window_capacity_keeps_most_recent() {
        let candles = (0..10).map(|i| bar(i as f64, i * 60)).collect();
        let window = CandleWindow::new(candles, 4);

        assert_eq!(window.len(), 4);
        assert_eq!(window.closes(), vec![6.0, 7.0, 8.0, 9.0]);
        assert!(window.has_at_least(4));
        assert!(!window.has_at_least(5));
    }

    #[test]
    fn test_window_drops_non_finite_bars() {
        let window = CandleWindow::from_candles(vec![bar(1.0, 60), bar(f64::NAN, 120)]);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_last_two() {
        let window = CandleWindow::from_candles(vec![bar(1.0, 60)]);
        assert!(window.last_two().is_none());

        let window = CandleWindow::from_candles(vec![bar(1.0, 60), bar(2.0, 120)]);
        let (prev, cur) = window.last_two().unwrap();
        assert_eq!(prev.close, 1.0);
        assert_eq!(cur.close, 2.0);
    }

    #[test]
    fn test_candle_accepts_numeric_strings() {
        let json = r#"{"open": "1.5", "high": 2, "low": "1.25", "close": 1.75, "epoch": 1700000000}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();

        assert_eq!(candle.open, 1.5);
        assert_eq!(candle.high, 2.0);
        assert_eq!(candle.low, 1.25);
        assert!(candle.is_bullish());
        assert!(candle.timestamp().is_some());
    }
}
