//! Data models for candles, signals, instruments, and trade outcomes.

mod candle;
mod instrument;
mod outcome;
mod signal;

pub use candle::{Candle, CandleWindow};
pub use instrument::{ContractDuration, Instrument};
pub use outcome::{FailureReason, TradeOutcome};
pub use signal::{IndicatorSnapshot, Signal};
