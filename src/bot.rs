//! Loop controller: the one place the trading pieces are composed.
//!
//! Each cycle runs to completion before the next begins:
//! - check (and roll over) the daily loss limit
//! - resolve the instrument and fetch a fresh candle window
//! - evaluate the strategy
//! - gate on the risk governor, then execute (or quote, in dry-run mode)
//! - record the outcome and pick a pacing delay
//!
//! Only the loss limit and an external shutdown end the loop. Every other
//! failure becomes a pacing delay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{SessionConfig, Transport};
use crate::db::{Database, TradeRecord};
use crate::models::{Instrument, Signal, TradeOutcome};
use crate::trading::{
    build_strategy, fetch_window, ContractType, CrossoverConfig, DiscoveryConfig, EnsembleConfig,
    ExecutionConfig, Executor, InstrumentDiscovery, RiskConfig, RiskGovernor, SignalStrategy,
    StrategyKind,
};

/// Delays between cycles, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Window empty, short, or fetch failed
    pub data_retry_secs: u64,

    /// Strategy returned NONE
    pub no_signal_secs: u64,

    /// Execution attempt failed
    pub failure_retry_secs: u64,

    /// After a fill (or a dry-run quote)
    pub trade_interval_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            data_retry_secs: 10,
            no_signal_secs: 30,
            failure_retry_secs: 10,
            trade_interval_secs: 60,
        }
    }
}

impl PacingConfig {
    pub fn delay(&self, pace: Pace) -> Duration {
        let secs = match pace {
            Pace::DataRetry => self.data_retry_secs,
            Pace::NoSignal => self.no_signal_secs,
            Pace::FailureRetry => self.failure_retry_secs,
            Pace::TradeInterval => self.trade_interval_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub session: SessionConfig,
    pub strategy: StrategyKind,
    pub crossover: CrossoverConfig,
    pub ensemble: EnsembleConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub discovery: DiscoveryConfig,

    /// Bars requested per fetch (also the window capacity)
    pub candle_count: usize,

    /// Bar size in minutes
    pub granularity_mins: u32,

    pub pacing: PacingConfig,

    /// Quote but never buy
    pub dry_run: bool,

    /// Seed today's P&L from the journal on start
    pub resume_day: bool,

    /// SQLite journal; `None` disables journaling
    pub journal_url: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            strategy: StrategyKind::default(),
            crossover: CrossoverConfig::default(),
            ensemble: EnsembleConfig::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            discovery: DiscoveryConfig::default(),
            candle_count: 60,
            granularity_mins: 1,
            pacing: PacingConfig::default(),
            dry_run: false,
            resume_day: false,
            journal_url: Some("sqlite:./sigbot.db?mode=rwc".to_string()),
        }
    }
}

impl BotConfig {
    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.discovery.symbols.is_empty(), "at least one candidate symbol is required");
        anyhow::ensure!(self.candle_count >= 2, "candle_count must be at least 2");
        anyhow::ensure!(self.granularity_mins > 0, "granularity_mins must be positive");
        anyhow::ensure!(self.execution.stake > Decimal::ZERO, "stake must be positive");
        anyhow::ensure!(
            self.risk.daily_loss_limit < Decimal::ZERO,
            "daily_loss_limit must be negative"
        );

        let min_window = build_strategy(self.strategy, &self.crossover, &self.ensemble).min_window();
        if self.candle_count < min_window {
            warn!(
                candle_count = self.candle_count,
                min_window,
                "Candle count is below the strategy's minimum window; no signal can fire"
            );
        }

        Ok(())
    }
}

/// Which delay to apply before the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    DataRetry,
    NoSignal,
    FailureRetry,
    TradeInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LossLimit,
    Shutdown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::LossLimit => "daily loss limit reached",
            StopReason::Shutdown => "shutdown requested",
        })
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue(Pace),
    Stop(StopReason),
}

/// Cloneable handle that asks the loop to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Session statistics.
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub cycles: u64,
    pub buy_signals: u64,
    pub sell_signals: u64,
    pub trades_filled: u64,
    pub trades_failed: u64,
    pub dry_run_quotes: u64,
    pub session_pnl: Decimal,
    pub daily_pnl: Decimal,
    pub last_instrument: Option<Instrument>,
    pub stop_reason: Option<StopReason>,
    pub dry_run: bool,
}

impl fmt::Display for BotStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Statistics ===")?;
        writeln!(f, "Cycles:          {}", self.cycles)?;
        writeln!(f, "Signals:         {} (Buy: {}, Sell: {})",
            self.buy_signals + self.sell_signals, self.buy_signals, self.sell_signals)?;
        writeln!(f, "Trades:          {} (Filled: {}, Failed: {})",
            self.trades_filled + self.trades_failed, self.trades_filled, self.trades_failed)?;
        if self.dry_run {
            writeln!(f, "Dry-run quotes:  {}", self.dry_run_quotes)?;
        }
        writeln!(f, "Session P&L:     ${:.2}", self.session_pnl)?;
        writeln!(f, "Daily P&L:       ${:.2}", self.daily_pnl)?;
        if let Some(instrument) = &self.last_instrument {
            writeln!(f, "Instrument:      {}", instrument)?;
        }
        writeln!(f, "Status:          {} {}",
            self.stop_reason.map_or("Running".to_string(), |r| format!("Stopped ({})", r)),
            if self.dry_run { "(Dry Run)" } else { "" })?;
        Ok(())
    }
}

/// Main loop controller.
pub struct Bot<T: Transport> {
    config: BotConfig,
    transport: T,
    strategy: Box<dyn SignalStrategy>,
    governor: RiskGovernor,
    discovery: InstrumentDiscovery,
    executor: Executor,
    journal: Option<Database>,
    stats: BotStats,

    // Shutdown signal
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T: Transport> Bot<T> {
    pub fn new(config: BotConfig, transport: T) -> Self {
        let strategy = build_strategy(config.strategy, &config.crossover, &config.ensemble);
        let governor = RiskGovernor::new(&config.risk, Local::now().date_naive());
        let discovery = InstrumentDiscovery::new(config.discovery.clone());
        let executor = Executor::new(config.execution.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stats = BotStats {
            dry_run: config.dry_run,
            ..Default::default()
        };

        Self {
            config,
            transport,
            strategy,
            governor,
            discovery,
            executor,
            journal: None,
            stats,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn with_journal(mut self, journal: Database) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn governor(&self) -> &RiskGovernor {
        &self.governor
    }

    pub fn stats(&self) -> BotStats {
        let mut stats = self.stats.clone();
        stats.daily_pnl = self.governor.daily_pnl();
        stats
    }

    /// Prepare for the first cycle: restore today's P&L from the journal if
    /// asked to.
    pub async fn initialize(&mut self) -> Result<()> {
        info!(
            strategy = self.strategy.name(),
            min_window = self.strategy.min_window(),
            dry_run = self.config.dry_run,
            stake = %self.config.execution.stake,
            loss_limit = %self.governor.stop_threshold(),
            "Initializing bot..."
        );

        if !self.config.resume_day {
            return Ok(());
        }

        match &self.journal {
            Some(journal) => {
                let today = self.governor.current_day();
                match journal.daily_pnl(today).await {
                    Ok(pnl) => {
                        self.governor = self.governor.clone().with_daily_pnl(pnl);
                        info!(day = %today, daily_pnl = %pnl, "Resumed today's P&L from journal");
                    }
                    Err(e) => warn!(error = %e, "Failed to read today's P&L from journal; starting from zero"),
                }
            }
            None => warn!("--resume-day needs a journal; starting from zero"),
        }

        Ok(())
    }

    /// Main run loop. Returns why it stopped.
    pub async fn run(&mut self) -> Result<StopReason> {
        info!(
            strategy = self.strategy.name(),
            dry_run = self.config.dry_run,
            "Starting bot run loop"
        );

        let reason = loop {
            if self.shutdown_requested() {
                break StopReason::Shutdown;
            }

            let pace = match self.cycle(&Local::now()).await {
                CycleOutcome::Stop(reason) => break reason,
                CycleOutcome::Continue(pace) => pace,
            };

            let delay = self.config.pacing.delay(pace);
            debug!(pace = ?pace, delay_secs = delay.as_secs(), "Pacing");

            let interrupted = tokio::select! {
                _ = tokio::time::sleep(delay) => false,
                _ = self.shutdown_rx.changed() => true,
            };
            if interrupted {
                break StopReason::Shutdown;
            }
        };

        self.stats.stop_reason = Some(reason);
        match reason {
            StopReason::LossLimit => warn!(
                daily_pnl = %self.governor.daily_pnl(),
                limit = %self.governor.stop_threshold(),
                "Daily loss limit reached. Stopping bot."
            ),
            StopReason::Shutdown => info!("Shutdown signal received"),
        }

        Ok(reason)
    }

    /// Single iteration of the main loop.
    pub async fn cycle<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> CycleOutcome {
        if self.governor.check_and_maybe_reset_day(now) {
            return CycleOutcome::Stop(StopReason::LossLimit);
        }

        // FetchWindow
        let instrument = self.discovery.resolve(&mut self.transport).await;
        self.stats.last_instrument = Some(instrument.clone());

        if self.shutdown_requested() {
            return CycleOutcome::Stop(StopReason::Shutdown);
        }

        let window = match fetch_window(
            &mut self.transport,
            &instrument.symbol,
            self.config.candle_count,
            self.config.granularity_mins,
        )
        .await
        {
            Ok(window) => window,
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "Candle fetch failed");
                return CycleOutcome::Continue(Pace::DataRetry);
            }
        };

        let min_window = self.strategy.min_window();
        if !window.has_at_least(min_window) {
            warn!(
                symbol = %instrument.symbol,
                bars = window.len(),
                min_window,
                "Not enough data"
            );
            return CycleOutcome::Continue(Pace::DataRetry);
        }

        for bar in window.tail(3) {
            debug!(
                epoch = bar.epoch,
                open = bar.open,
                high = bar.high,
                low = bar.low,
                close = bar.close,
                "Bar"
            );
        }

        // Evaluate
        self.stats.cycles += 1;
        let (signal, snapshot) = self.strategy.evaluate(&window);
        info!(
            instrument = %instrument,
            signal = %signal,
            indicators = %snapshot,
            "Evaluated"
        );

        let Some(contract) = ContractType::from_signal(signal) else {
            info!("No signal");
            return CycleOutcome::Continue(Pace::NoSignal);
        };
        match signal {
            Signal::Buy => self.stats.buy_signals += 1,
            Signal::Sell => self.stats.sell_signals += 1,
            Signal::None => {}
        }

        // Gate
        if self.governor.is_stopped() {
            return CycleOutcome::Stop(StopReason::LossLimit);
        }
        if self.shutdown_requested() {
            return CycleOutcome::Stop(StopReason::Shutdown);
        }

        // Execute
        let stake = self.config.execution.stake;
        let day = now.date_naive();

        if self.config.dry_run {
            let outcome = match self
                .executor
                .quote(&mut self.transport, &instrument, contract, stake)
                .await
            {
                Ok(proposal) => {
                    info!(
                        instrument = %instrument,
                        contract = %contract,
                        stake = %stake,
                        proposal_id = %proposal.id,
                        payout = ?proposal.payout,
                        "Dry run: would execute"
                    );
                    self.stats.dry_run_quotes += 1;
                    TradeOutcome {
                        detail: Some(format!("dry run, proposal {}", proposal.id)),
                        ..TradeOutcome::filled(Decimal::ZERO, None)
                    }
                }
                Err(outcome) => outcome,
            };
            self.record(day, &instrument, contract, stake, &outcome, true).await;

            if !outcome.accepted {
                self.stats.trades_failed += 1;
                warn!(
                    instrument = %instrument,
                    contract = %contract,
                    reason = ?outcome.failure_reason,
                    detail = ?outcome.detail,
                    "Dry run: quote failed"
                );
                return CycleOutcome::Continue(Pace::FailureRetry);
            }
            return CycleOutcome::Continue(Pace::TradeInterval);
        }

        let outcome = self
            .executor
            .execute(&mut self.transport, &instrument, contract, stake)
            .await;
        self.record(day, &instrument, contract, stake, &outcome, false).await;

        if !outcome.accepted {
            self.stats.trades_failed += 1;
            warn!(
                instrument = %instrument,
                contract = %contract,
                reason = ?outcome.failure_reason,
                detail = ?outcome.detail,
                "Trade not executed"
            );
            return CycleOutcome::Continue(Pace::FailureRetry);
        }

        self.governor.record_outcome(&outcome);
        self.stats.trades_filled += 1;
        self.stats.session_pnl += outcome.realized_profit;
        info!(
            profit = %outcome.realized_profit,
            daily_pnl = %self.governor.daily_pnl(),
            "Trade recorded"
        );

        CycleOutcome::Continue(Pace::TradeInterval)
    }

    async fn record(
        &self,
        day: NaiveDate,
        instrument: &Instrument,
        contract: ContractType,
        stake: Decimal,
        outcome: &TradeOutcome,
        dry_run: bool,
    ) {
        let Some(journal) = &self.journal else {
            return;
        };

        let record = TradeRecord {
            day,
            instrument,
            contract,
            stake,
            outcome,
            dry_run,
        };
        if let Err(e) = journal.record_trade(&record).await {
            error!(error = %e, "Failed to journal trade");
        }
    }
}
