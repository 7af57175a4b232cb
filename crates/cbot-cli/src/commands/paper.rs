//! `cbot paper-run`: the full loop against the paper venue.
//!
//! Quotes follow a deterministic walk (`drift_bp` per tick, 2 bp spread), and
//! the intent cycle repeats. Useful for smoke-testing config and wiring; it
//! never talks to a real venue.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use cbot_day::{DayManager, TradingCalendar};
use cbot_execution::{ExecutionCounters, SystemClock};
use cbot_runtime::{Intent, LoopConfig, TickReport, TradingLoop};
use cbot_testkit::PaperExchange;
use tracing::info;

use super::{ensure_parent_dir, load_bot_config};

pub struct PaperRunArgs {
    pub config_paths: Vec<PathBuf>,
    pub ticks: u32,
    pub cash: f64,
    pub price: f64,
    pub drift_bp: f64,
    pub intents: String,
    pub interval_ms: u64,
}

fn parse_intents(raw: &str) -> Result<Vec<Intent>> {
    let mut out = Vec::new();
    for tok in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        out.push(match tok.to_ascii_lowercase().as_str() {
            "buy" => Intent::Buy,
            "sell" => Intent::Sell,
            "hold" => Intent::Hold,
            other => bail!("invalid intent '{}'. expected one of: buy | sell | hold", other),
        });
    }
    if out.is_empty() {
        bail!("--intents must name at least one intent");
    }
    Ok(out)
}

pub fn run(args: PaperRunArgs) -> Result<()> {
    if !args.price.is_finite() || args.price <= 0.0 {
        bail!("--price must be positive");
    }
    let intents = parse_intents(&args.intents)?;
    let (cfg, loaded) = load_bot_config(&args.config_paths)?;
    ensure_parent_dir(&cfg.snapshot_path)?;

    let ex = Arc::new(PaperExchange::new(args.cash));
    let mut mid = args.price;
    set_quote(&ex, &cfg.symbol, mid);

    let counters = Arc::new(ExecutionCounters::new());
    let day = DayManager::new(TradingCalendar::new(&cfg.timezone), cfg.snapshot_path.clone());
    let (mut lp, startup) = TradingLoop::start(
        LoopConfig::from_bot_config(&cfg),
        day,
        ex.clone(),
        SystemClock,
        counters.clone(),
    )?;
    info!(config_hash = %loaded.config_hash, startup = ?startup.kind, "paper run starting");

    for i in 0..args.ticks {
        let intent = intents[i as usize % intents.len()];
        let report = lp.tick(intent);
        print_tick(i, intent, &report);

        mid *= 1.0 + args.drift_bp / 10_000.0;
        set_quote(&ex, &cfg.symbol, mid);
        if args.interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    let st = lp.state();
    println!(
        "final equity_usd={:.2} orders_today={} realized_pnl_usd={:.2}",
        st.equity_now_usd, st.orders_today, st.realized_pnl_usd
    );
    println!("{}", serde_json::to_string(&counters.snapshot())?);
    Ok(())
}

fn set_quote(ex: &PaperExchange, symbol: &str, mid: f64) {
    let half_spread = mid * 0.0001;
    ex.set_quote(symbol, mid - half_spread, mid + half_spread);
}

fn print_tick(i: u32, intent: Intent, r: &TickReport) {
    let outcome = if let Some(o) = &r.order {
        format!("FILLED {} {:.8} @ {:.2}", o.side, o.qty, o.avg_price.unwrap_or(f64::NAN))
    } else if let Some(g) = r.refusal {
        g.to_string()
    } else if let Some(e) = &r.error {
        format!("ERROR {e}")
    } else if let Some(reason) = r.decision.as_ref().and_then(|d| d.reason_text()) {
        format!("DENIED {reason}")
    } else {
        "-".to_string()
    };
    println!(
        "tick={} intent={:?} mid={:.4} equity={:.2} {}",
        i,
        intent,
        r.mid.unwrap_or(f64::NAN),
        r.equity_usd.unwrap_or(f64::NAN),
        outcome
    );
}
