//! Screener Trader - Main Entry Point
//!
//! One run reads the screener, selects pairs and places market orders.
//! Paper trading is the default; set `LIVE_TRADING=true` to trade on Oanda.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use screener_trader::config::Config;
use screener_trader::exchange::{Broker, OandaClient, PaperBroker};
use screener_trader::sheets::{CsvRowSource, GoogleSheetsClient, RowSource};
use screener_trader::strategy::{AccountState, OrderExecutor, SelectionEngine, SelectionReport};
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Screener Trader CLI
#[derive(Parser)]
#[command(name = "screener-trader")]
#[command(version, about = "Screener-driven position sizing and order placement on Oanda")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one selection and submission pass (default)
    Run {
        /// Read rows from a CSV export instead of Google Sheets
        #[arg(short, long)]
        rows: Option<String>,

        /// Select and log intents without submitting orders
        #[arg(long)]
        dry_run: bool,
    },

    /// Offline selection against a CSV export; prints intents as JSON
    Plan {
        /// Path to CSV export of the screener
        #[arg(short, long)]
        rows: String,

        /// Buying power to size against
        #[arg(short, long)]
        buying_power: Decimal,

        /// Instruments already held (comma separated)
        #[arg(long, value_delimiter = ',')]
        held: Vec<String>,
    },
}

/// Trading mode: Live (real money) or Paper (simulated fills).
#[derive(Debug, Clone, Copy, PartialEq)]
enum TradingMode {
    Live,
    Paper,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Plan {
            rows,
            buying_power,
            held,
        }) => {
            // Stdout carries the JSON plan, so no logging here.
            plan(&rows, buying_power, held).await
        }
        Some(Commands::Run { rows, dry_run }) => {
            init_logging()?;
            run(rows.as_deref(), dry_run).await
        }
        None => {
            init_logging()?;
            run(None, false).await
        }
    }
}

async fn run(rows_path: Option<&str>, dry_run: bool) -> Result<()> {
    info!(
        "Screener Trader v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let trading_mode = if std::env::var("LIVE_TRADING").unwrap_or_default() == "true" {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
        TradingMode::Live
    } else {
        info!("📝 PAPER TRADING MODE - Orders are simulated");
        TradingMode::Paper
    };

    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;
    log_config(&config);

    let broker: Box<dyn Broker> = match trading_mode {
        TradingMode::Live => Box::new(OandaClient::new(&config.oanda, &config.execution)?),
        TradingMode::Paper => Box::new(PaperBroker::new(config.paper.starting_balance)),
    };

    let account = broker
        .account_state()
        .await
        .context("Failed to fetch account state")?;
    info!(
        broker = broker.name(),
        buying_power = %account.buying_power,
        held = account.held.len(),
        "Account state loaded"
    );

    if account.buying_power <= Decimal::ZERO {
        warn!(buying_power = %account.buying_power, "No buying power available, nothing to do");
        return Ok(());
    }

    let executor = OrderExecutor::new(config.execution.clone());
    if executor.should_skip_run(&account) {
        info!(
            held = ?account.held,
            "Single-position mode: a position is already open, skipping run"
        );
        return Ok(());
    }

    let source: Box<dyn RowSource> = match rows_path {
        Some(path) => Box::new(CsvRowSource::new(path, config.sheet.has_header)),
        None => Box::new(GoogleSheetsClient::new(
            &config.sheet,
            config.oanda.request_timeout_secs,
        )?),
    };
    let rows = source
        .fetch_rows()
        .await
        .with_context(|| format!("Failed to read rows from {}", source.describe()))?;
    info!(source = %source.describe(), rows = rows.len(), "Screener rows loaded");

    if rows.is_empty() {
        warn!("No screener rows, nothing to do");
        return Ok(());
    }

    let engine = SelectionEngine::new(&config.allocation);
    let report = engine.select(&rows, &account);
    log_report(&report);

    if report.intents.is_empty() {
        info!("No order intents selected");
        return Ok(());
    }

    if dry_run {
        for intent in executor.eligible(&report.intents) {
            info!(
                pair = %intent.pair,
                units = intent.units,
                side = %intent.side,
                notional = %intent.notional,
                "[DRY RUN] Would place market order"
            );
        }
        return Ok(());
    }

    let results = executor.submit_all(broker.as_ref(), &report.intents).await;
    let placed = results.iter().filter(|r| r.success).count();
    let failed = results.len() - placed;
    info!(placed, failed, "Run complete");

    anyhow::ensure!(failed == 0, "{} of {} orders failed", failed, results.len());
    Ok(())
}

/// Offline selection with no broker or sheet involved.
async fn plan(rows_path: &str, buying_power: Decimal, held: Vec<String>) -> Result<()> {
    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;

    let account = plan_account(buying_power, held)?;
    let rows = CsvRowSource::new(rows_path, config.sheet.has_header)
        .fetch_rows()
        .await?;

    let report = SelectionEngine::new(&config.allocation).select(&rows, &account);
    let json = serde_json::to_string_pretty(&report.intents)
        .context("Failed to serialize order intents")?;
    println!("{}", json);

    Ok(())
}

/// Account snapshot for an offline plan.
fn plan_account(buying_power: Decimal, held: Vec<String>) -> Result<AccountState> {
    anyhow::ensure!(
        buying_power > Decimal::ZERO,
        "--buying-power must be positive, got {}",
        buying_power
    );

    Ok(AccountState::new(buying_power).with_held(
        held.into_iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty()),
    ))
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "screener-trader.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("screener_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    let alloc = &config.allocation;

    info!("📋 Configuration:");
    info!("   Oanda Environment: {:?}", config.oanda.environment);
    info!(
        "   Worksheet: {} (header: {})",
        config.sheet.worksheet, config.sheet.has_header
    );
    info!(
        "   Go Tokens: bullish {} / bearish {}",
        alloc.bullish_go_token, alloc.bearish_go_token
    );
    info!(
        "   Brackets: {} bullish / {} bearish steps",
        alloc.bullish_brackets.len(),
        alloc.bearish_brackets.len()
    );
    info!(
        "   Mood Markers: {} bullish / {} bearish",
        alloc.bullish_multipliers.len(),
        alloc.bearish_multipliers.len()
    );
    info!(
        "   Min Notional: {} ({} dp)",
        alloc.min_notional, alloc.notional_decimals
    );
    info!(
        "   Orders: {} / {}, single position: {}",
        config.execution.time_in_force,
        config.execution.position_fill,
        config.execution.single_position_mode
    );
}

/// Log a summary of one selection pass.
fn log_report(report: &SelectionReport) {
    info!(
        rows = report.rows_scanned,
        candidates = report.candidates.len(),
        intents = report.intents.len(),
        skipped = report.skipped.len(),
        rejected = report.rejected.len(),
        "Selection complete"
    );

    for (reason, count) in report.skip_counts() {
        info!("   Skipped {}: {}", reason, count);
    }
    for (reason, count) in report.reject_counts() {
        info!("   Rejected {}: {}", reason, count);
    }
    if report.dropped_candidates() > 0 {
        info!(
            "   Dropped {} candidate(s) sized below one unit",
            report.dropped_candidates()
        );
    }

    for intent in &report.intents {
        info!(
            "   {} {} units={} notional={} @ {}",
            intent.side, intent.pair, intent.units, intent.notional, intent.price
        );
    }
}
