//! Signal strategies: map a candle window to BUY / SELL / NONE.
//!
//! Strategies are stateless and deterministic: the same window always yields
//! the same signal and snapshot. A window shorter than the strategy's minimum
//! yields `NONE` with an empty snapshot, never an error.

use std::fmt;

use crate::indicators::{atr, bollinger, ema, last_crossing, macd, rsi, Cross};
use crate::models::{CandleWindow, IndicatorSnapshot, Signal};

use super::config::{CrossoverConfig, EnsembleConfig, StrategyKind};

/// A decision unit the loop controller can run.
pub trait SignalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bars required before any indicator is computed.
    fn min_window(&self) -> usize;

    fn evaluate(&self, window: &CandleWindow) -> (Signal, IndicatorSnapshot);
}

/// Build the configured strategy.
pub fn build_strategy(
    kind: StrategyKind,
    crossover: &CrossoverConfig,
    ensemble: &EnsembleConfig,
) -> Box<dyn SignalStrategy> {
    match kind {
        StrategyKind::Ensemble => Box::new(EnsembleVote::new(ensemble.clone())),
        StrategyKind::Crossover => Box::new(CrossoverFilter::new(crossover.clone())),
        StrategyKind::Engulfing => Box::new(EngulfingPattern),
    }
}

fn insufficient(window: &CandleWindow, min_window: usize) -> bool {
    // Crossings always need a previous bar.
    !window.has_at_least(min_window.max(2))
}

// ============================================================================
// Crossover filter
// ============================================================================

/// EMA crossover confirmed by price action and gated on ATR.
///
/// BUY requires all of: a bullish fast/slow EMA crossing on the last bar,
/// close above the fast EMA, close above the previous close, and ATR strictly
/// above the floor. SELL mirrors it.
#[derive(Debug, Clone)]
pub struct CrossoverFilter {
    config: CrossoverConfig,
}

impl CrossoverFilter {
    pub fn new(config: CrossoverConfig) -> Self {
        Self { config }
    }
}

impl SignalStrategy for CrossoverFilter {
    fn name(&self) -> &'static str {
        "crossover"
    }

    fn min_window(&self) -> usize {
        self.config.min_window
    }

    fn evaluate(&self, window: &CandleWindow) -> (Signal, IndicatorSnapshot) {
        if insufficient(window, self.config.min_window) {
            return (Signal::None, IndicatorSnapshot::new());
        }

        let closes = window.closes();
        let fast = ema(&closes, self.config.ema_fast);
        let slow = ema(&closes, self.config.ema_slow);
        let diff: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

        let cross = last_crossing(&diff);
        let atr_value = atr(&window.highs(), &window.lows(), &closes, self.config.atr_period);

        let n = closes.len();
        let (prev_close, close) = (closes[n - 2], closes[n - 1]);
        let fast_last = fast[n - 1];
        let slow_last = slow[n - 1];

        let mut snapshot = IndicatorSnapshot::new();
        snapshot.insert(format!("EMA{}", self.config.ema_fast), fast_last);
        snapshot.insert(format!("EMA{}", self.config.ema_slow), slow_last);
        snapshot.insert("ATR", atr_value);
        snapshot.insert("Close", close);
        snapshot.label("Cross", cross.as_str());

        let volatile = atr_value > self.config.min_atr;

        let signal = match cross {
            Cross::Bullish if close > fast_last && close > prev_close && volatile => Signal::Buy,
            Cross::Bearish if close < fast_last && close < prev_close && volatile => Signal::Sell,
            _ => Signal::None,
        };

        (signal, snapshot)
    }
}

// ============================================================================
// Ensemble vote
// ============================================================================

/// One indicator's directional opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Buy,
    Sell,
    Abstain,
}

impl Vote {
    fn from_cross(cross: Cross) -> Self {
        match cross {
            Cross::Bullish => Vote::Buy,
            Cross::Bearish => Vote::Sell,
            Cross::None => Vote::Abstain,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Vote::Buy => "+1",
            Vote::Sell => "-1",
            Vote::Abstain => "0",
        })
    }
}

/// Tally votes. A side wins only with at least `threshold` votes and strictly
/// more than the other side.
pub fn decide(votes: &[Vote], threshold: usize) -> Signal {
    let buys = votes.iter().filter(|v| **v == Vote::Buy).count();
    let sells = votes.iter().filter(|v| **v == Vote::Sell).count();

    if buys >= threshold && buys > sells {
        Signal::Buy
    } else if sells >= threshold && sells > buys {
        Signal::Sell
    } else {
        Signal::None
    }
}

fn in_open_band(value: f64, (low, high): (f64, f64)) -> bool {
    value > low && value < high
}

/// Four independent indicators vote; the signal needs a quorum.
///
/// - EMA cross: fast/slow crossing on the last bar
/// - RSI band: inside the buy band votes buy, inside the sell band votes sell
/// - Bollinger: close above the upper band votes sell, below the lower votes buy
/// - MACD: histogram zero-crossing on the last bar
#[derive(Debug, Clone)]
pub struct EnsembleVote {
    config: EnsembleConfig,
}

impl EnsembleVote {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }
}

impl SignalStrategy for EnsembleVote {
    fn name(&self) -> &'static str {
        "ensemble"
    }

    fn min_window(&self) -> usize {
        self.config.min_window
    }

    fn evaluate(&self, window: &CandleWindow) -> (Signal, IndicatorSnapshot) {
        let cfg = &self.config;
        if insufficient(window, cfg.min_window) {
            return (Signal::None, IndicatorSnapshot::new());
        }

        let closes = window.closes();
        let close = closes[closes.len() - 1];
        let mut snapshot = IndicatorSnapshot::new();

        let fast = ema(&closes, cfg.ema_fast);
        let slow = ema(&closes, cfg.ema_slow);
        let diff: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let ema_vote = Vote::from_cross(last_crossing(&diff));
        snapshot.insert(format!("EMA{}", cfg.ema_fast), fast[fast.len() - 1]);
        snapshot.insert(format!("EMA{}", cfg.ema_slow), slow[slow.len() - 1]);

        let rsi_vote = match rsi(&closes, cfg.rsi_period) {
            Some(value) => {
                snapshot.insert("RSI", value);
                if in_open_band(value, cfg.rsi_buy_band) {
                    Vote::Buy
                } else if in_open_band(value, cfg.rsi_sell_band) {
                    Vote::Sell
                } else {
                    Vote::Abstain
                }
            }
            None => Vote::Abstain,
        };

        let bb_vote = match bollinger(&closes, cfg.bb_period, cfg.bb_k) {
            Some(bands) => {
                snapshot.insert("BB_upper", bands.upper);
                snapshot.insert("BB_lower", bands.lower);
                if close > bands.upper {
                    Vote::Sell
                } else if close < bands.lower {
                    Vote::Buy
                } else {
                    Vote::Abstain
                }
            }
            None => Vote::Abstain,
        };

        let macd = macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        let macd_vote = Vote::from_cross(last_crossing(&macd.histogram));
        if let Some(hist) = macd.histogram.last() {
            snapshot.insert("MACD_hist", *hist);
        }

        snapshot.insert("Close", close);

        let votes = [ema_vote, rsi_vote, bb_vote, macd_vote];
        snapshot.label(
            "Votes",
            format!("ema={} rsi={} bb={} macd={}", ema_vote, rsi_vote, bb_vote, macd_vote),
        );

        (decide(&votes, cfg.vote_threshold), snapshot)
    }
}

// ============================================================================
// Engulfing pattern
// ============================================================================

/// Two-bar engulfing reversal.
///
/// Bullish: a bearish bar followed by a bullish bar that opens at or below the
/// previous close and closes above the previous open. Bearish mirrors it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngulfingPattern;

impl SignalStrategy for EngulfingPattern {
    fn name(&self) -> &'static str {
        "engulfing"
    }

    fn min_window(&self) -> usize {
        2
    }

    fn evaluate(&self, window: &CandleWindow) -> (Signal, IndicatorSnapshot) {
        let Some((prev, cur)) = window.last_two() else {
            return (Signal::None, IndicatorSnapshot::new());
        };

        let bullish = prev.is_bearish()
            && cur.is_bullish()
            && cur.open <= prev.close
            && cur.close > prev.open;
        let bearish = prev.is_bullish()
            && cur.is_bearish()
            && cur.open >= prev.close
            && cur.close < prev.open;

        let mut snapshot = IndicatorSnapshot::new();
        snapshot.insert("PrevOpen", prev.open);
        snapshot.insert("PrevClose", prev.close);
        snapshot.insert("Open", cur.open);
        snapshot.insert("Close", cur.close);

        let signal = if bullish {
            snapshot.label("Pattern", "bullish_engulfing");
            Signal::Buy
        } else if bearish {
            snapshot.label("Pattern", "bearish_engulfing");
            Signal::Sell
        } else {
            Signal::None
        };

        (signal, snapshot)
    }
}
