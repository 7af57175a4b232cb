//! Trading-day calendar.
//!
//! A trading day runs from local midnight to the next local midnight in the
//! configured timezone. Two instants are on the same trading day iff their
//! local midnights are identical.
//!
//! Pure logic. No IO, no wall-clock.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradingCalendar {
    /// Name as configured; persisted into snapshots.
    name: String,
    tz: Tz,
}

impl TradingCalendar {
    /// Build from an IANA timezone name. Empty means UTC; an unrecognized
    /// name also falls back to UTC (with a warning) but keeps its name.
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() {
            return Self::utc();
        }
        let tz = match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(timezone = name, "unrecognized timezone; falling back to UTC");
                Tz::UTC
            }
        };
        Self {
            name: name.to_string(),
            tz,
        }
    }

    pub fn utc() -> Self {
        Self {
            name: "UTC".to_string(),
            tz: Tz::UTC,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Local midnight of the trading day containing `now`, as a UTC instant.
    pub fn day_open(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = now.with_timezone(&self.tz).date_naive();
        local_midnight(&self.tz, local_date)
    }

    /// Local midnight of the next trading day. Follows the calendar date, so
    /// DST days are 23 or 25 hours long.
    pub fn next_open(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = now.with_timezone(&self.tz).date_naive();
        match local_date.succ_opt() {
            Some(next) => local_midnight(&self.tz, next),
            None => self.day_open(now) + Duration::hours(24),
        }
    }

    pub fn same_trading_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_open(a) == self.day_open(b)
    }
}

/// First instant of `date` in `tz`. Where a DST jump skips midnight, the day
/// opens at the first local time that exists.
fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=3)
        .find_map(|h| {
            tz.from_local_datetime(&(midnight + Duration::hours(h)))
                .earliest()
        })
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
