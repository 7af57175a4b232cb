//! cbot-runtime
//!
//! One driving loop per process. Each `tick`:
//!
//! 1. reads the touch and pushes the mid into the volatility window
//! 2. refreshes equity from the account
//! 3. rolls the trading day over if local midnight has passed
//! 4. sizes the caller's intent through the decision engine
//! 5. submits an allowed order through `SafeExchange`
//! 6. checkpoints the day snapshot after a fill or when the interval elapsed
//!
//! Signal generation is the caller's job; the loop only acts on an `Intent`.

mod trading_loop;

pub use trading_loop::{Intent, LoopConfig, TickReport, TradingLoop};
