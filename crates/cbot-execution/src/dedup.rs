//! Duplicate-order suppression.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::types::Side;

/// Short hex fingerprint of (symbol, side, qty). Qty is rendered to 8 decimal
/// places so float noise below that does not split identical orders.
pub fn order_fingerprint(symbol: &str, side: Side, qty: f64) -> String {
    let mut h = Sha256::new();
    h.update(symbol.as_bytes());
    h.update(side.as_str().as_bytes());
    h.update(format!("{qty:.8}").as_bytes());
    let digest = h.finalize();
    hex::encode(&digest[..8])
}

/// Remembers the most recent successful fingerprint plus the fingerprints of
/// submissions still waiting on the exchange.
#[derive(Clone, Debug)]
pub struct DedupGuard {
    window: Duration,
    last: Option<(String, DateTime<Utc>)>,
    in_flight: Vec<String>,
}

impl DedupGuard {
    /// A zero window disables suppression.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: None,
            in_flight: Vec::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_duplicate(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        if self.window.is_zero() {
            return false;
        }
        if self.in_flight.iter().any(|fp| fp == fingerprint) {
            return true;
        }
        match &self.last {
            Some((fp, at)) if fp == fingerprint => {
                (now - *at).to_std().map(|d| d < self.window).unwrap_or(true)
            }
            _ => false,
        }
    }

    pub fn remember(&mut self, fingerprint: String, at: DateTime<Utc>) {
        self.last = Some((fingerprint, at));
    }

    /// Mark `fingerprint` as submitted but not yet answered.
    pub fn reserve(&mut self, fingerprint: &str) {
        if !self.window.is_zero() {
            self.in_flight.push(fingerprint.to_string());
        }
    }

    /// The reserved submission succeeded at `at`.
    pub fn commit(&mut self, fingerprint: &str, at: DateTime<Utc>) {
        self.release(fingerprint);
        self.remember(fingerprint.to_string(), at);
    }

    /// The reserved submission failed; identical orders may go again.
    pub fn release(&mut self, fingerprint: &str) {
        if let Some(i) = self.in_flight.iter().position(|fp| fp == fingerprint) {
            self.in_flight.swap_remove(i);
        }
    }

    pub fn last(&self) -> Option<&(String, DateTime<Utc>)> {
        self.last.as_ref()
    }
}
