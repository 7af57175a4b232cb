use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cbot")]
#[command(about = "Trading bot safety-layer operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Day snapshot utilities
    Snapshot {
        #[command(subcommand)]
        cmd: SnapshotCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env overlay -> ...)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the trading-day open and next open for a timezone
    DayOpen {
        /// IANA timezone (unknown names fall back to UTC)
        #[arg(long, default_value = "UTC")]
        tz: String,

        /// Instant to evaluate (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Run a bounded loop against the paper venue with a scripted intent cycle
    PaperRun {
        /// Layered config paths in merge order (defaults apply when empty)
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// Number of ticks to run
        #[arg(long, default_value_t = 10)]
        ticks: u32,

        /// Starting paper cash in quote currency
        #[arg(long, default_value_t = 10_000.0)]
        cash: f64,

        /// Starting mid price
        #[arg(long, default_value_t = 100.0)]
        price: f64,

        /// Per-tick mid drift in basis points (negative walks down)
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        drift_bp: f64,

        /// Comma-separated intent cycle: buy, sell, hold
        #[arg(long, default_value = "buy,hold,sell,hold")]
        intents: String,

        /// Wall-clock pause between ticks, milliseconds
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,
    },
}

#[derive(Subcommand)]
enum SnapshotCmd {
    /// Print the snapshot and whether it belongs to the current trading day
    Show {
        #[arg(long)]
        path: PathBuf,
    },

    /// Write a fresh seed for today. Refuses to overwrite without --force.
    Seed {
        #[arg(long)]
        path: PathBuf,

        #[arg(long, default_value = "UTC")]
        tz: String,

        /// Equity at day open, quote currency
        #[arg(long)]
        equity: f64,

        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing;
    // production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Snapshot { cmd } => match cmd {
            SnapshotCmd::Show { path } => commands::snapshot::show(&path),
            SnapshotCmd::Seed {
                path,
                tz,
                equity,
                force,
            } => commands::snapshot::seed(&path, &tz, equity, force),
        },

        Commands::ConfigHash { paths } => commands::config_hash(&paths),

        Commands::DayOpen { tz, at } => commands::day_open(&tz, at.as_deref()),

        Commands::PaperRun {
            config_paths,
            ticks,
            cash,
            price,
            drift_bp,
            intents,
            interval_ms,
        } => commands::paper::run(commands::paper::PaperRunArgs {
            config_paths,
            ticks,
            cash,
            price,
            drift_bp,
            intents,
            interval_ms,
        }),
    }
}

// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
