//! Trading logic: strategies, risk governor, discovery, and execution.

mod config;
mod discovery;
mod executor;
mod market_data;
mod risk;
mod strategy;

pub use config::{
    CrossoverConfig, DiscoveryConfig, EnsembleConfig, ExecutionConfig, RiskConfig, StrategyKind,
};
pub use discovery::InstrumentDiscovery;
pub use executor::{ContractType, Executor};
pub use market_data::fetch_window;
pub use risk::RiskGovernor;
pub use strategy::{build_strategy, SignalStrategy};
