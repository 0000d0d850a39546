//! Signal-driven options bot
//!
//! Pulls recent candles from the venue, runs an indicator strategy over them,
//! and places short-duration rise/fall contracts under a daily loss limit.

mod api;
mod bot;
mod db;
mod indicators;
mod models;
mod trading;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::DerivSession;
use crate::bot::{Bot, BotConfig};
use crate::db::Database;
use crate::trading::{build_strategy, fetch_window, InstrumentDiscovery, StrategyKind};

/// Signal bot CLI.
#[derive(Parser)]
#[command(name = "sigbot")]
#[command(about = "Trade short-duration contracts on indicator signals", long_about = None)]
struct Cli {
    /// Journal database URL (defaults to the config file's, then ./sigbot.db)
    #[arg(short, long)]
    database: Option<String>,

    /// Disable the trade journal
    #[arg(long)]
    no_journal: bool,

    /// JSON file with bot configuration (missing fields use defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// API token
    #[arg(long, env = "DERIV_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Registered application id
    #[arg(long, env = "DERIV_APP_ID")]
    app_id: Option<String>,

    /// WebSocket endpoint
    #[arg(long, env = "DERIV_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trading loop
    Run {
        /// Signal strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyKind>,

        /// Quote only, never buy
        #[arg(long)]
        dry_run: bool,

        /// Stake per trade in account currency
        #[arg(long)]
        stake: Option<Decimal>,

        /// Daily loss limit (a loss of this size stops the bot; sign is ignored)
        #[arg(long, allow_hyphen_values = true)]
        loss_limit: Option<Decimal>,

        /// Start from today's journaled P&L instead of zero
        #[arg(long)]
        resume_day: bool,
    },

    /// Evaluate the strategy once and print the signal
    Signal {
        /// Signal strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyKind>,
    },

    /// Show the instrument the bot would trade
    Symbols,

    /// Show current configuration
    Config,

    /// Show journal statistics
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            strategy,
            dry_run,
            stake,
            loss_limit,
            resume_day,
        } => {
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            if let Some(stake) = stake {
                config.execution.stake = stake;
            }
            if let Some(limit) = loss_limit {
                config.risk.daily_loss_limit = -limit.abs();
            }
            config.dry_run |= dry_run;
            config.resume_day |= resume_day;
            config.validate()?;

            run(config).await?;
        }

        Commands::Signal { strategy } => {
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            config.validate()?;

            let mut session = DerivSession::new(config.session.clone());
            let instrument = InstrumentDiscovery::new(config.discovery.clone())
                .resolve(&mut session)
                .await;
            let window = fetch_window(
                &mut session,
                &instrument.symbol,
                config.candle_count,
                config.granularity_mins,
            )
            .await
            .with_context(|| format!("Failed to fetch candles for {}", instrument.symbol))?;
            session.close().await;

            let strategy = build_strategy(config.strategy, &config.crossover, &config.ensemble);
            let (signal, snapshot) = strategy.evaluate(&window);

            println!("\n=== Signal ===");
            println!("Instrument:  {}", instrument);
            println!("Strategy:    {} (min window {})", strategy.name(), strategy.min_window());
            println!("Bars:        {}", window.len());
            if let Some(last) = window.last() {
                let time = last
                    .timestamp()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| last.epoch.to_string());
                println!("Last Bar:    {} O {} H {} L {} C {}", time, last.open, last.high, last.low, last.close);
            }
            println!("Signal:      {}", signal);
            println!("Indicators:  {}", snapshot);
        }

        Commands::Symbols => {
            let mut session = DerivSession::new(config.session.clone());
            let instrument = InstrumentDiscovery::new(config.discovery.clone())
                .resolve(&mut session)
                .await;

            println!("\n=== Instrument ===");
            println!("Candidates:  {}", config.discovery.symbols.join(", "));
            println!("Selected:    {}", instrument.symbol);
            println!("Duration:    {}", instrument.duration);
            println!("Account:     {}", session.login_id().unwrap_or("(not authorized)"));

            session.close().await;
        }

        Commands::Config => {
            println!("\n=== Session ===\n");
            println!("  Endpoint:             {}", config.session.endpoint);
            println!("  App ID:               {}", config.session.app_id);
            println!("  Token:                {}", if config.session.token.is_empty() { "not set" } else { "set" });
            println!("  Response Timeout:     {}s", config.session.response_timeout_secs);

            println!("\n=== Trading ===\n");
            println!("  Strategy:             {}", config.strategy);
            println!("  Symbols:              {}", config.discovery.symbols.join(", "));
            println!("  Preferred Duration:   {}m", config.discovery.preferred_duration_mins);
            println!("  Stake:                {} {}", config.execution.stake, config.execution.currency);
            println!("  Daily Loss Limit:     {}", config.risk.daily_loss_limit);
            println!("  Candles:              {} x {}m", config.candle_count, config.granularity_mins);

            println!("\nCrossover Filter:");
            println!("  EMA:                  {}/{}", config.crossover.ema_fast, config.crossover.ema_slow);
            println!("  ATR:                  {} (floor {})", config.crossover.atr_period, config.crossover.min_atr);
            println!("  Min Window:           {}", config.crossover.min_window);

            println!("\nEnsemble Vote:");
            println!("  EMA:                  {}/{}", config.ensemble.ema_fast, config.ensemble.ema_slow);
            println!("  RSI:                  {} (buy {:?}, sell {:?})",
                config.ensemble.rsi_period, config.ensemble.rsi_buy_band, config.ensemble.rsi_sell_band);
            println!("  Bollinger:            {} x {}", config.ensemble.bb_period, config.ensemble.bb_k);
            println!("  MACD:                 {}/{}/{}",
                config.ensemble.macd_fast, config.ensemble.macd_slow, config.ensemble.macd_signal);
            println!("  Vote Threshold:       {}", config.ensemble.vote_threshold);
            println!("  Min Window:           {}", config.ensemble.min_window);

            println!("\nPacing:");
            println!("  Data Retry:           {}s", config.pacing.data_retry_secs);
            println!("  No Signal:            {}s", config.pacing.no_signal_secs);
            println!("  Failure Retry:        {}s", config.pacing.failure_retry_secs);
            println!("  Trade Interval:       {}s", config.pacing.trade_interval_secs);

            println!("\nJournal:                {}", config.journal_url.as_deref().unwrap_or("disabled"));
            println!();
        }

        Commands::Status => {
            let Some(url) = config.journal_url.as_deref() else {
                println!("Journal is disabled.");
                return Ok(());
            };
            let db = Database::new(url).await?;
            let today = Local::now().date_naive();

            let pnl = db.daily_pnl(today).await?;
            let day_stats = db.trade_stats(Some(today)).await?;
            let all_stats = db.trade_stats(None).await?;
            let recent = db.recent_trades(10).await?;

            println!("\n=== Today ({}) ===", today);
            println!("Realized P&L:     ${:.2}", pnl);
            println!("Loss Limit:       ${:.2}", config.risk.daily_loss_limit);
            println!("Trades:           {} (Filled: {}, Failed: {}, Dry Run: {})",
                day_stats.total, day_stats.filled, day_stats.failed, day_stats.dry_run);

            println!("\n=== All Time ===");
            println!("Trades:           {} (Filled: {}, Failed: {}, Dry Run: {})",
                all_stats.total, all_stats.filled, all_stats.failed, all_stats.dry_run);

            if !recent.is_empty() {
                println!("\n=== Recent Trades ===");
                for trade in &recent {
                    let result = if trade.dry_run {
                        "dry run".to_string()
                    } else if trade.accepted {
                        format!("profit {}", trade.profit)
                    } else {
                        trade.failure_reason.clone().unwrap_or_else(|| "failed".to_string())
                    };
                    println!(
                        "  {} {:<8} {:<4} {:>3} stake {:<6} {}",
                        trade.created_at, trade.symbol, trade.contract_type, trade.duration, trade.stake, result
                    );
                }
            }
        }
    }

    Ok(())
}

/// Defaults, then the config file, then credentials and journal flags.
fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => BotConfig::default(),
    };

    if let Some(token) = &cli.token {
        config.session.token = token.clone();
    }
    if let Some(app_id) = &cli.app_id {
        config.session.app_id = app_id.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.session.endpoint = endpoint.clone();
    }

    if cli.no_journal {
        config.journal_url = None;
    } else if let Some(database) = &cli.database {
        config.journal_url = Some(database.clone());
    }

    Ok(config)
}

async fn run(config: BotConfig) -> Result<()> {
    if config.session.token.is_empty() && !config.dry_run {
        warn!("DERIV_TOKEN is not set; proposals and buys will be rejected");
    }

    let journal = match config.journal_url.as_deref() {
        Some(url) => match Database::new(url).await {
            Ok(db) => Some(db),
            Err(e) => {
                warn!(error = %e, "Journal unavailable, continuing without it");
                None
            }
        },
        None => None,
    };

    let session = DerivSession::new(config.session.clone());
    let mut bot = Bot::new(config, session);
    if let Some(journal) = journal {
        bot = bot.with_journal(journal);
    }
    bot.initialize().await?;

    let shutdown = bot.shutdown_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, stopping");
            shutdown.trigger();
        }
    });

    let reason = bot.run().await?;
    bot.transport_mut().close().await;

    info!(reason = %reason, "Bot stopped");
    println!("\n{}", bot.stats());

    Ok(())
}
