//! Strategy, risk, execution, and discovery configuration.

use clap::ValueEnum;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Which signal strategy the loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Four-indicator vote (primary)
    #[default]
    Ensemble,
    /// EMA crossover with price-action and ATR filters
    Crossover,
    /// Two-bar engulfing candle pattern
    Engulfing,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::Ensemble => "ensemble",
            StrategyKind::Crossover => "crossover",
            StrategyKind::Engulfing => "engulfing",
        };
        f.write_str(name)
    }
}

/// EMA crossover + price action + volatility gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Minimum bars before any indicator is computed
    pub min_window: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub atr_period: usize,

    /// ATR must be strictly above this to trade
    pub min_atr: f64,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            min_window: 35,
            ema_fast: 9,
            ema_slow: 21,
            atr_period: 14,
            min_atr: 0.30, // calibrated for R_25
        }
    }
}

/// Ensemble voting over EMA cross, RSI band, Bollinger, and MACD histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub min_window: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,

    /// Open interval where RSI votes buy
    pub rsi_buy_band: (f64, f64),

    /// Open interval where RSI votes sell
    pub rsi_sell_band: (f64, f64),

    pub bb_period: usize,
    pub bb_k: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    /// Votes one side needs (and must also outnumber the other side)
    pub vote_threshold: usize,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        let ema_slow = 20;
        let rsi_period = 14;
        let bb_period = 20;
        let macd_slow = 26;

        Self {
            min_window: ema_slow.max(rsi_period).max(bb_period).max(macd_slow) + 2,
            ema_fast: 5,
            ema_slow,
            rsi_period,
            rsi_buy_band: (55.0, 90.0),
            rsi_sell_band: (10.0, 45.0),
            bb_period,
            bb_k: 2.0,
            macd_fast: 12,
            macd_slow,
            macd_signal: 9,
            vote_threshold: 2,
        }
    }
}

/// Daily loss limit for the risk governor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Stop once the day's realized P&L is at or below this (negative)
    pub daily_loss_limit: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: dec!(-10.0),
        }
    }
}

/// Order parameters sent with each proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Fixed stake per trade
    pub stake: Decimal,
    pub currency: String,
    pub basis: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            stake: dec!(1.0),
            currency: "USD".to_string(),
            basis: "stake".to_string(),
        }
    }
}

/// Candidate symbols and contract duration preference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Tried in order; the first active one wins
    pub symbols: Vec<String>,
    pub product_type: String,
    pub preferred_duration_mins: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["R_25".to_string(), "R_10".to_string()], // lower volatility first
            product_type: "synthetic_index".to_string(),
            preferred_duration_mins: 1,
        }
    }
}
