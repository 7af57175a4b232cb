//! The exchange capability consumed by the core.
//!
//! Implementations own the wire protocol (REST, WebSocket, paper). The core
//! only ever sees this trait.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{Account, Order, Side, Ticker};

/// Boxed so adapters can surface their own error types unchanged.
pub type ExchangeError = Box<dyn std::error::Error + Send + Sync>;

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// Stops a price subscription. Calling it more than once is impossible by type.
pub type CancelFn = Box<dyn FnOnce() + Send>;

pub trait Exchange: Send + Sync {
    /// Best bid and best ask for `symbol`.
    fn best_bid_ask(&self, symbol: &str) -> ExchangeResult<(f64, f64)>;

    fn account(&self) -> ExchangeResult<Account>;

    /// Blocking market-order submission. No cancellation of an in-flight call.
    fn place_market(&self, symbol: &str, side: Side, qty: f64) -> ExchangeResult<Order>;

    /// Stream trade prices for `symbol` into `out` until the returned cancel
    /// function is called.
    fn stream_prices(&self, symbol: &str, out: mpsc::Sender<Ticker>) -> ExchangeResult<CancelFn>;
}

impl<E: Exchange + ?Sized> Exchange for Arc<E> {
    fn best_bid_ask(&self, symbol: &str) -> ExchangeResult<(f64, f64)> {
        (**self).best_bid_ask(symbol)
    }

    fn account(&self) -> ExchangeResult<Account> {
        (**self).account()
    }

    fn place_market(&self, symbol: &str, side: Side, qty: f64) -> ExchangeResult<Order> {
        (**self).place_market(symbol, side, qty)
    }

    fn stream_prices(&self, symbol: &str, out: mpsc::Sender<Ticker>) -> ExchangeResult<CancelFn> {
        (**self).stream_prices(symbol, out)
    }
}
