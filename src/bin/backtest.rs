use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use trc_backtester::backtesting::{
    write_summary, BacktestRequest, BacktestRunner, CsvEventSink, CsvTradeSink,
};
use trc_backtester::config::Config;
use trc_backtester::feed::csv_source::parse_timestamp;
use trc_backtester::feed::CsvBarSource;
use trc_backtester::strategies::htf_bias::BiasVoter;
use trc_backtester::trading::PaperExecutionModel;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Replay a bar CSV through TRC structure/retest detection")]
struct Args {
    /// Input bars (time,open,high,low,close,volume)
    #[arg(long)]
    csv: PathBuf,

    /// Output directory for events.csv, trades.csv and summary.json
    #[arg(long)]
    out: Option<PathBuf>,

    /// Symbol label stamped on trades
    #[arg(long)]
    symbol: Option<String>,

    /// SMA length of every bias lane
    #[arg(long)]
    sma_len: Option<usize>,

    /// Bars a retest setup stays armed
    #[arg(long)]
    max_retest_bars: Option<u32>,

    /// Skip bars before this time (RFC 3339, UTC if no offset)
    #[arg(long, value_parser = parse_time)]
    start: Option<DateTime<Utc>>,

    /// Stop at the first bar at or after this time
    #[arg(long, value_parser = parse_time)]
    end: Option<DateTime<Utc>>,

    /// Let wicks through a pivot trigger CHOCH, not just closes
    #[arg(long)]
    wick_breaks: bool,

    /// Set a take-profit at this multiple of the entry risk
    #[arg(long)]
    reward_multiple: Option<Decimal>,
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = Config::from_env().context("Invalid environment configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    if let Some(symbol) = args.symbol {
        cfg.symbol = symbol;
    }
    if let Some(out) = args.out {
        cfg.out_dir = out;
    }
    if let Some(n) = args.sma_len {
        cfg.bias.sma_len = n;
    }
    if let Some(n) = args.max_retest_bars {
        cfg.trc.max_retest_bars = n;
    }
    if args.wick_breaks {
        cfg.trc.require_close_beyond_structure = false;
    }
    cfg.validate()?;

    println!("╔══════════════════════════════════════════════════╗");
    println!("║          TRC STRUCTURE / RETEST BACKTEST         ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!("  Symbol:     {}", cfg.symbol);
    println!("  Input:      {}", args.csv.display());
    println!("  Output:     {}", cfg.out_dir.display());
    println!(
        "  Bias:       {} / {} / {} (SMA {})",
        cfg.bias.timeframes[0], cfg.bias.timeframes[1], cfg.bias.timeframes[2], cfg.bias.sma_len
    );
    println!("  Retest:     {} bars", cfg.trc.max_retest_bars);
    println!();

    let source = CsvBarSource::open(&args.csv)?;
    let events = CsvEventSink::create(cfg.out_dir.join("events.csv")).await?;
    let trades = CsvTradeSink::create(cfg.out_dir.join("trades.csv")).await?;
    let mut execution = PaperExecutionModel::new();
    if let Some(multiple) = args.reward_multiple {
        execution = execution.with_reward_multiple(multiple);
    }

    let mut runner = BacktestRunner::new(
        Box::new(source),
        Box::new(BiasVoter::new(&cfg.bias)?),
        Box::new(events),
        Box::new(trades),
        Box::new(execution),
    );

    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping at the next bar");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let request = BacktestRequest::new(cfg.symbol.clone(), cfg.trc).with_window(args.start, args.end);
    let stats = runner.run(&request).await.context("Backtest failed")?;

    let summary = cfg.out_dir.join("summary.json");
    write_summary(&summary, &stats).await?;
    info!("Summary written to {}", summary.display());

    stats.print_summary();
    Ok(())
}
