//! Paper exchange: immediate fills at the touch, scripted failures.
//!
//! Buys fill at the ask, sells at the bid. Equity is cash plus positions
//! marked at mid. Every call to `place_market` counts as an attempt whether
//! or not it fills, so tests can assert exactly how much traffic reached the
//! venue.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cbot_execution::{
    Account, CancelFn, Clock, Exchange, ExchangeResult, Order, Side, SystemClock, Ticker,
};
use tokio::sync::mpsc;
use tracing::debug;

const QTY_EPS: f64 = 1e-12;

struct Subscriber {
    symbol: String,
    out: mpsc::Sender<Ticker>,
    cancelled: Arc<AtomicBool>,
}

#[derive(Default)]
struct Book {
    quotes: BTreeMap<String, (f64, f64)>,
    cash_usd: f64,
    positions: BTreeMap<String, f64>,
    next_order_id: u64,
    attempts: u64,
    fail_next: u32,
    fail_always: bool,
    fills: Vec<Order>,
    subscribers: Vec<Subscriber>,
}

pub struct PaperExchange {
    book: Mutex<Book>,
    clock: Arc<dyn Clock>,
}

impl PaperExchange {
    pub fn new(cash_usd: f64) -> Self {
        Self::with_clock(cash_usd, Arc::new(SystemClock))
    }

    /// Fill timestamps come from `clock`.
    pub fn with_clock(cash_usd: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            book: Mutex::new(Book {
                cash_usd,
                next_order_id: 1,
                ..Book::default()
            }),
            clock,
        }
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Set the touch and push the new mid to live subscribers of `symbol`.
    pub fn set_quote(&self, symbol: &str, bid: f64, ask: f64) {
        let ts = self.clock.now();
        let mut book = self.book();
        book.quotes.insert(symbol.to_string(), (bid, ask));
        let mid = (bid + ask) / 2.0;
        book.subscribers.retain(|s| {
            if s.cancelled.load(Ordering::SeqCst) || s.out.is_closed() {
                return false;
            }
            if s.symbol == symbol {
                // A full channel drops the tick, like a slow websocket reader.
                let _ = s.out.try_send(Ticker {
                    symbol: symbol.to_string(),
                    price: mid,
                    ts,
                });
            }
            true
        });
    }

    /// The next `n` submissions fail.
    pub fn fail_next(&self, n: u32) {
        self.book().fail_next = n;
    }

    pub fn set_fail_always(&self, on: bool) {
        self.book().fail_always = on;
    }

    pub fn set_position(&self, symbol: &str, qty: f64) {
        self.book().positions.insert(symbol.to_string(), qty);
    }

    /// Every submission that reached the venue, filled or not.
    pub fn attempts(&self) -> u64 {
        self.book().attempts
    }

    pub fn fills(&self) -> Vec<Order> {
        self.book().fills.clone()
    }

    pub fn cash_usd(&self) -> f64 {
        self.book().cash_usd
    }

    pub fn position(&self, symbol: &str) -> f64 {
        self.book().positions.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn live_subscribers(&self) -> usize {
        self.book()
            .subscribers
            .iter()
            .filter(|s| !s.cancelled.load(Ordering::SeqCst))
            .count()
    }
}

impl Exchange for PaperExchange {
    fn best_bid_ask(&self, symbol: &str) -> ExchangeResult<(f64, f64)> {
        self.book()
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| format!("paper: no quote for {symbol}").into())
    }

    fn account(&self) -> ExchangeResult<Account> {
        let book = self.book();
        let marked: f64 = book
            .positions
            .iter()
            .map(|(sym, qty)| {
                let mid = book
                    .quotes
                    .get(sym)
                    .map(|(b, a)| (b + a) / 2.0)
                    .unwrap_or(0.0);
                qty * mid
            })
            .sum();
        Ok(Account {
            equity_usd: book.cash_usd + marked,
            cash_usd: book.cash_usd,
            positions: book.positions.clone(),
        })
    }

    fn place_market(&self, symbol: &str, side: Side, qty: f64) -> ExchangeResult<Order> {
        let submitted_at = self.clock.now();
        let mut book = self.book();
        book.attempts += 1;

        if book.fail_always {
            return Err("paper: venue unavailable".into());
        }
        if book.fail_next > 0 {
            book.fail_next -= 1;
            return Err("paper: simulated transient failure".into());
        }
        if !qty.is_finite() || qty <= 0.0 {
            return Err(format!("paper: invalid qty {qty}").into());
        }
        let (bid, ask) = book
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| format!("paper: no quote for {symbol}"))?;

        let held = book.positions.get(symbol).copied().unwrap_or(0.0);
        let px = match side {
            Side::Buy => {
                let cost = qty * ask;
                if cost > book.cash_usd + QTY_EPS {
                    return Err(format!("paper: insufficient cash for {cost:.2}").into());
                }
                book.cash_usd -= cost;
                book.positions.insert(symbol.to_string(), held + qty);
                ask
            }
            Side::Sell => {
                if qty > held + QTY_EPS {
                    return Err(format!("paper: insufficient position {held} < {qty}").into());
                }
                book.cash_usd += qty * bid;
                book.positions.insert(symbol.to_string(), (held - qty).max(0.0));
                bid
            }
        };

        let order = Order {
            order_id: format!("PAPER-{:06}", book.next_order_id),
            symbol: symbol.to_string(),
            side,
            qty,
            avg_price: Some(px),
            status: "FILLED".to_string(),
            submitted_at,
        };
        book.next_order_id += 1;
        book.fills.push(order.clone());
        debug!(order_id = %order.order_id, symbol, side = side.as_str(), qty, px, "paper fill");
        Ok(order)
    }

    fn stream_prices(&self, symbol: &str, out: mpsc::Sender<Ticker>) -> ExchangeResult<CancelFn> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let ts = self.clock.now();
        let mut book = self.book();
        if let Some((bid, ask)) = book.quotes.get(symbol).copied() {
            let _ = out.try_send(Ticker {
                symbol: symbol.to_string(),
                price: (bid + ask) / 2.0,
                ts,
            });
        }
        book.subscribers.push(Subscriber {
            symbol: symbol.to_string(),
            out,
            cancelled: cancelled.clone(),
        });
        Ok(Box::new(move || cancelled.store(true, Ordering::SeqCst)))
    }
}
