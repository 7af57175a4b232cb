//! Deterministic test doubles for the exchange capability and the clock.
//!
//! `PaperExchange` fills market orders immediately against a settable quote.
//! `ManualClock` is virtual time whose `sleep` advances instead of blocking.
//! No randomness, no network I/O.

mod clock;
mod paper;

pub use clock::ManualClock;
pub use paper::PaperExchange;
