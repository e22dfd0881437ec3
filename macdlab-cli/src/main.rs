//! MacdLab CLI: run, init and macd commands.
//!
//! Commands:
//! - `run`: backtest the MACD strategy on a CSV feed or synthetic data
//! - `init`: write the default config as TOML
//! - `macd`: print the MACD series of a CSV feed

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use chrono::NaiveDateTime;
use macdlab_core::config::Config;
use macdlab_core::domain::Frequency;
use macdlab_core::indicators::compute_macd;
use macdlab_runner::{run_backtest, save_artifacts, BacktestResult, BarFeed};

#[derive(Parser)]
#[command(name = "macdlab", about = "MacdLab CLI: MACD crossover strategy and paper backtester")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the strategy described by a TOML config.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV with `timestamp,close` columns.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Generate a seeded random walk instead of reading CSV.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output directory for artifacts. Nothing is written when omitted.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Write the default config.
    Init {
        /// Destination file. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print DIF, signal and histogram for every bar of a CSV feed.
    Macd {
        /// CSV with `timestamp,close` columns.
        #[arg(long)]
        data: PathBuf,

        /// Config supplying the periods. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.json_logs);

    match cli.command {
        Commands::Run {
            config,
            data,
            synthetic,
            seed,
            output_dir,
        } => run_cmd(config, data, synthetic, seed, output_dir),
        Commands::Init { output } => init_cmd(output),
        Commands::Macd {
            data,
            config,
            format,
        } => macd_cmd(&data, config, format),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::from_file(&p).with_context(|| format!("loading {}", p.display())),
        None => Ok(Config::default()),
    }
}

fn run_cmd(
    config_path: Option<PathBuf>,
    data: Option<PathBuf>,
    synthetic: bool,
    seed: u64,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    if data.is_some() && synthetic {
        bail!("--data and --synthetic are mutually exclusive");
    }
    let config = load_config(config_path)?;
    info!(fingerprint = %config.fingerprint()?, "config loaded");
    let security = config.strategy.security.clone();
    let frequency = config.strategy.frequency;

    let feed = match data {
        Some(path) => BarFeed::from_csv(&path, security, frequency)
            .with_context(|| format!("loading bars from {}", path.display()))?,
        None if synthetic => {
            let required = config.macd_params().required_history();
            let start = synthetic_start(config.start_time()?, frequency, required)?;
            BarFeed::synthetic(security, frequency, start, config.end_time()?, seed)
        }
        None => bail!("one of --data or --synthetic is required"),
    };

    let result = run_backtest(&config, feed)?;
    print_summary(&result, synthetic);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&dir, &result)?;
        info!(dir = %run_dir.display(), "artifacts written");
        println!("Artifacts:      {}", run_dir.display());
    }
    Ok(())
}

/// Start of a synthetic feed: `required` bars before the backtest window, so
/// the first evaluated bar has full history.
fn synthetic_start(
    start: NaiveDateTime,
    frequency: Frequency,
    required: usize,
) -> Result<NaiveDateTime> {
    let bars = i32::try_from(required)
        .with_context(|| format!("longest_history {required} is too large for a synthetic feed"))?;
    let warmup = frequency
        .duration()
        .checked_mul(bars)
        .with_context(|| format!("{required} bars of {frequency} overflow the warmup span"))?;
    match start.checked_sub_signed(warmup) {
        Some(t) => Ok(t),
        None => bail!("warmup of {required} bars before {start} is out of range"),
    }
}

fn init_cmd(output: Option<PathBuf>) -> Result<()> {
    let mut config = Config::default();
    config.backtest.benchmark = Some(config.strategy.security.clone());
    let toml = config.to_toml()?;
    match output {
        Some(path) => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            std::fs::write(&path, toml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{toml}"),
    }
    Ok(())
}

fn macd_cmd(data: &Path, config_path: Option<PathBuf>, format: Format) -> Result<()> {
    let config = load_config(config_path)?;
    let feed = BarFeed::from_csv(data, config.strategy.security.clone(), config.strategy.frequency)
        .with_context(|| format!("loading bars from {}", data.display()))?;
    let bars = feed.series();
    let series = compute_macd(&bars.closes(), &config.macd_params())?;

    let cell = |v: f64| if v.is_nan() { String::new() } else { format!("{v:.6}") };
    match format {
        Format::Csv => {
            println!("timestamp,close,dif,signal,histogram");
            for (i, bar) in bars.iter().enumerate() {
                println!(
                    "{},{},{},{},{}",
                    bar.timestamp,
                    bar.close,
                    cell(series.dif[i]),
                    cell(series.signal[i]),
                    cell(series.histogram[i]),
                );
            }
        }
        Format::Json => {
            let rows: Vec<serde_json::Value> = bars
                .iter()
                .enumerate()
                .filter_map(|(i, bar)| {
                    series.get(i).map(|m| {
                        serde_json::json!({
                            "timestamp": bar.timestamp.to_string(),
                            "close": bar.close,
                            "dif": m.dif_line,
                            "signal": m.signal_line,
                            "histogram": m.histogram,
                        })
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}

fn print_summary(result: &BacktestResult, synthetic: bool) {
    let c = &result.counts;
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Security:       {} ({})", result.security, result.frequency);
    println!("Period:         {} to {}", result.start_time, result.end_time);
    println!("Run ID:         {}", result.run_id);
    println!(
        "Bars:           {} ({} evaluated, {} skipped)",
        c.bars, c.evaluated, c.skipped
    );
    println!(
        "Orders:         {} submitted, {} filled, {} unfilled",
        c.submitted, c.filled, c.rejected
    );
    for (reason, n) in &result.no_actions {
        println!("  no order:     {n} x {reason}");
    }
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", result.final_equity());
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    if let Some(benchmark) = &result.benchmark {
        println!(
            "Benchmark:      {:.2}% ({benchmark} buy-and-hold)",
            m.benchmark_return * 100.0
        );
        println!("Excess Return:  {:.2}%", m.excess_return * 100.0);
    }
    if synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
