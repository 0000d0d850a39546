//! Trade journal.
//!
//! Every execution attempt (filled, failed, or dry-run quote) is written to a
//! local SQLite file so the day's realized P&L survives a restart and the
//! `status` command can report on past runs. Monetary values are stored as
//! decimal strings so they read back exactly.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Instrument, TradeOutcome};
use crate::trading::ContractType;

/// Journal connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// One execution attempt as written by the loop controller.
#[derive(Debug, Clone)]
pub struct TradeRecord<'a> {
    pub day: NaiveDate,
    pub instrument: &'a Instrument,
    pub contract: ContractType,
    pub stake: Decimal,
    pub outcome: &'a TradeOutcome,
    pub dry_run: bool,
}

/// Stored journal row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub id: String,
    pub trade_day: String,
    pub symbol: String,
    pub duration: String,
    pub contract_type: String,
    pub stake: String,
    pub accepted: bool,
    pub profit: String,
    pub failure_reason: Option<String>,
    pub contract_id: Option<String>,
    pub detail: Option<String>,
    pub dry_run: bool,
    pub created_at: String,
}

/// Attempt counts for a day (or all time).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TradeStats {
    pub total: i64,
    pub filled: i64,
    pub failed: i64,
    pub dry_run: i64,
}

impl Database {
    /// Open (creating if needed) the journal at `database_url`.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 5).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Private in-memory journal. Single connection, since each in-memory
    /// connection is its own database.
    #[cfg(test)]
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    #[cfg(test)]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                trade_day TEXT NOT NULL,
                symbol TEXT NOT NULL,
                duration TEXT NOT NULL,
                contract_type TEXT NOT NULL,
                stake TEXT NOT NULL,
                accepted INTEGER NOT NULL,
                profit TEXT NOT NULL DEFAULT '0',
                failure_reason TEXT,
                contract_id TEXT,
                detail TEXT,
                dry_run INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_day ON trades(trade_day)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Append one attempt. Returns the journal id.
    pub async fn record_trade(&self, record: &TradeRecord<'_>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let outcome = record.outcome;

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, trade_day, symbol, duration, contract_type, stake, accepted,
                profit, failure_reason, contract_id, detail, dry_run
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(record.day.to_string())
        .bind(&record.instrument.symbol)
        .bind(record.instrument.duration.to_string())
        .bind(record.contract.as_str())
        .bind(record.stake.to_string())
        .bind(outcome.accepted)
        .bind(outcome.realized_profit.to_string())
        .bind(outcome.failure_reason.map(|r| r.as_str()))
        .bind(outcome.contract_id.as_deref())
        .bind(outcome.detail.as_deref())
        .bind(record.dry_run)
        .execute(&self.pool)
        .await
        .context("Failed to record trade")?;

        Ok(id)
    }

    /// Realized P&L of filled, live trades on `day`.
    pub async fn daily_pnl(&self, day: NaiveDate) -> Result<Decimal> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT profit FROM trades WHERE trade_day = ? AND accepted = 1 AND dry_run = 0",
        )
        .bind(day.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to read daily P&L")?;

        let mut total = Decimal::ZERO;
        for (profit,) in rows {
            match Decimal::from_str(&profit) {
                Ok(value) => total += value,
                Err(e) => warn!(profit = %profit, error = %e, "Skipping unreadable journal profit"),
            }
        }

        Ok(total)
    }

    /// Attempt counts for `day`, or across the whole journal.
    pub async fn trade_stats(&self, day: Option<NaiveDate>) -> Result<TradeStats> {
        let day = day.map(|d| d.to_string());

        let (total, filled, failed, dry_run): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN accepted = 1 AND dry_run = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN accepted = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN dry_run = 1 THEN 1 ELSE 0 END), 0)
            FROM trades
            WHERE ? IS NULL OR trade_day = ?
            "#,
        )
        .bind(day.as_deref())
        .bind(day.as_deref())
        .fetch_one(&self.pool)
        .await
        .context("Failed to read trade stats")?;

        Ok(TradeStats {
            total,
            filled,
            failed,
            dry_run,
        })
    }

    /// Most recent attempts, newest first.
    pub async fn recent_trades(&self, limit: i64) -> Result<Vec<StoredTrade>> {
        sqlx::query_as::<_, StoredTrade>(
            "SELECT * FROM trades ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent trades")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContractDuration, FailureReason};
    use rust_decimal_macros::dec;

    async fn journal() -> Database {
        Database::connect_in_memory().await.unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn record(db: &Database, day: NaiveDate, outcome: TradeOutcome, dry_run: bool) {
        let instrument = Instrument::new("R_25", ContractDuration::minutes(1));
        db.record_trade(&TradeRecord {
            day,
            instrument: &instrument,
            contract: ContractType::Call,
            stake: dec!(1),
            outcome: &outcome,
            dry_run,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_daily_pnl_sums_filled_trades_exactly() {
        let db = journal().await;

        record(&db, day(4), TradeOutcome::filled(dec!(-0.85), Some("1".into())), false).await;
        record(&db, day(4), TradeOutcome::filled(dec!(0.95), Some("2".into())), false).await;
        record(&db, day(4), TradeOutcome::failed(FailureReason::VenueRejected, "no"), false).await;
        record(&db, day(3), TradeOutcome::filled(dec!(-5), None), false).await;

        assert_eq!(db.daily_pnl(day(4)).await.unwrap(), dec!(0.10));
        assert_eq!(db.daily_pnl(day(3)).await.unwrap(), dec!(-5));
        assert_eq!(db.daily_pnl(day(5)).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_trade_stats() {
        let db = journal().await;

        record(&db, day(4), TradeOutcome::filled(dec!(0.95), None), false).await;
        record(&db, day(4), TradeOutcome::failed(FailureReason::ConfirmationMissing, "x"), false).await;
        record(&db, day(4), TradeOutcome::filled(Decimal::ZERO, None), true).await;
        record(&db, day(5), TradeOutcome::filled(dec!(0.95), None), false).await;

        let stats = db.trade_stats(Some(day(4))).await.unwrap();
        assert_eq!(
            stats,
            TradeStats {
                total: 3,
                filled: 1,
                failed: 1,
                dry_run: 1
            }
        );

        let all = db.trade_stats(None).await.unwrap();
        assert_eq!(all.total, 4);

        // Dry runs never count toward P&L.
        assert_eq!(db.daily_pnl(day(4)).await.unwrap(), dec!(0.95));
    }

    #[tokio::test]
    async fn test_recent_trades() {
        let db = journal().await;

        record(&db, day(4), TradeOutcome::failed(FailureReason::TransportFailure, "closed"), false).await;
        record(&db, day(4), TradeOutcome::filled(dec!(0.95), Some("42".into())), false).await;

        let trades = db.recent_trades(10).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].contract_id.as_deref(), Some("42"));
        assert_eq!(trades[0].profit, "0.95");
        assert_eq!(trades[1].failure_reason.as_deref(), Some("transport_failure"));
        assert_eq!(trades[1].duration, "1m");
        assert_eq!(trades[1].contract_type, "CALL");
    }
}
