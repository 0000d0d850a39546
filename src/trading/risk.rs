//! Daily loss limit.
//!
//! Tracks realized P&L for the current calendar day and reports when it has
//! fallen to or below the configured (negative) threshold. The loop
//! controller is the only caller: one stop check at the top of each cycle and
//! one update after each execution.

use chrono::{DateTime, NaiveDate, TimeZone};
use rust_decimal::Decimal;
use tracing::info;

use crate::models::TradeOutcome;

use super::config::RiskConfig;

#[derive(Debug, Clone)]
pub struct RiskGovernor {
    stop_threshold: Decimal,
    daily_pnl: Decimal,
    current_day: NaiveDate,
}

impl RiskGovernor {
    pub fn new(config: &RiskConfig, today: NaiveDate) -> Self {
        Self {
            stop_threshold: config.daily_loss_limit,
            daily_pnl: Decimal::ZERO,
            current_day: today,
        }
    }

    /// Start from P&L already realized today (e.g. read back from the journal).
    pub fn with_daily_pnl(mut self, pnl: Decimal) -> Self {
        self.daily_pnl = pnl;
        self
    }

    /// Roll over to a new day if `now` falls on one, then report whether the
    /// stop is active.
    pub fn check_and_maybe_reset_day<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> bool {
        let today = now.date_naive();
        if today != self.current_day {
            info!(
                previous_day = %self.current_day,
                previous_pnl = %self.daily_pnl,
                "New trading day, resetting daily P&L"
            );
            self.current_day = today;
            self.daily_pnl = Decimal::ZERO;
        }

        self.is_stopped()
    }

    /// Add a filled trade's realized profit. Failed attempts are ignored.
    pub fn record_outcome(&mut self, outcome: &TradeOutcome) {
        if outcome.accepted {
            self.daily_pnl += outcome.realized_profit;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.daily_pnl <= self.stop_threshold
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    pub fn stop_threshold(&self) -> Decimal {
        self.stop_threshold
    }
}
