//! DasLocateTrader - Main Entry Point
//!
//! Connects to a DAS Trader terminal, locates shares for the candidate
//! tickers across the configured routes, and shorts the ones that clear the
//! pre-trade gate.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use das_locate_trader::common::channels::create_cancel_flag;
use das_locate_trader::config::load_config;
use das_locate_trader::engine::sizing::notional_per_ticker;
use das_locate_trader::{AutoApprove, Candidate, Confirm, Session, TradingWorkflow};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); defaults to settings.log_level
    #[arg(long)]
    log_level: Option<String>,

    /// JSON file holding an array of candidate rows
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Candidate as SYMBOL or SYMBOL:NOTIONAL (repeatable)
    #[arg(long = "ticker", value_parser = parse_ticker)]
    tickers: Vec<(String, Option<Decimal>)>,

    /// Portfolio value split across candidates without a notional
    #[arg(long)]
    portfolio_value: Option<Decimal>,

    /// Run every stage without prompting
    #[arg(long, env = "DAS_AUTORUN")]
    autorun: bool,

    /// Stop after this many cycles
    #[arg(long)]
    max_cycles: Option<usize>,
}

fn parse_ticker(input: &str) -> std::result::Result<(String, Option<Decimal>), String> {
    match input.split_once(':') {
        Some((symbol, notional)) => {
            let notional: Decimal = notional
                .trim()
                .parse()
                .map_err(|e| format!("bad notional in {:?}: {}", input, e))?;
            Ok((symbol.trim().to_uppercase(), Some(notional)))
        }
        None => Ok((input.trim().to_uppercase(), None)),
    }
}

/// Prompts on stdin before each stage
struct StdinConfirm {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinConfirm {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, stage: &str) -> bool {
        println!("Type 'Y' to {} or anything else to stop: ", stage);
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}

async fn load_candidates(args: &Args) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    if let Some(path) = &args.candidates {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let rows: Vec<Candidate> =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        candidates.extend(rows);
    }
    for (symbol, notional) in &args.tickers {
        candidates.push(Candidate {
            ticker: symbol.clone(),
            target_notional: *notional,
            last_bid: None,
            last_ask: None,
            volume: None,
        });
    }
    Ok(candidates)
}

async fn run<C: Confirm>(
    args: &Args,
    config: das_locate_trader::AppConfig,
    candidates: Vec<Candidate>,
    default_notional: Decimal,
    confirm: C,
) -> Result<()> {
    let mut session = Session::connect(&config.terminal, config.settle.clone()).await?;
    session.authenticate(&config.terminal.credentials()).await?;

    let mut workflow =
        TradingWorkflow::new(session, config.trading, confirm, &candidates, default_notional)?;

    let (cancel_tx, cancel_rx) = create_cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current cycle...");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = workflow.run(args.max_cycles, cancel_rx).await;
    match &outcome {
        Ok(reports) => info!("Completed {} cycles", reports.len()),
        Err(e) => error!("Workflow aborted: {}", e),
    }

    match workflow.snapshot_json() {
        Ok(snapshot) => println!("{}", snapshot),
        Err(e) => warn!("{}", e),
    }
    workflow.shutdown().await?;
    outcome?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = load_config(Some(&args.config)).context("loading configuration")?;

    // Initialize logging
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting DasLocateTrader");
    info!("Configuration file: {}", args.config);
    info!(
        "Terminal {}:{} routes {:?}",
        config.terminal.host, config.terminal.port, config.trading.locate_routes
    );

    let candidates = load_candidates(&args).await?;
    if candidates.is_empty() {
        bail!("no candidates given; use --candidates or --ticker");
    }

    let unsized_count = candidates.iter().filter(|c| c.target_notional.is_none()).count();
    let default_notional = match args.portfolio_value {
        Some(portfolio) => notional_per_ticker(
            portfolio,
            candidates.len(),
            config.trading.max_position_fraction,
        ),
        None => {
            if unsized_count > 0 {
                warn!(
                    "{} candidates have no notional and no --portfolio-value was given",
                    unsized_count
                );
            }
            Decimal::ZERO
        }
    };

    if args.autorun {
        run(&args, config, candidates, default_notional, AutoApprove).await
    } else {
        run(&args, config, candidates, default_notional, StdinConfirm::new()).await
    }
}
