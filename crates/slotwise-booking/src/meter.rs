//! Metering hooks for booking state transitions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use slotwise_store::{Database, OptionalExt};
use slotwise_types::{date_key, temporal::DATE_FORMAT};

use crate::error::BookingResult;

pub const STATS_TABLE: &str = "stats";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeterEvent {
    /// Appointments published (new or republished).
    Published,
    /// Slots booked.
    Booked,
    /// Bookings cancelled by the user.
    Cancelled,
    /// Tokens released because their slot was removed on republish.
    Released,
}

impl MeterEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for MeterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives booking engine events. Recording must never fail the operation
/// that triggered it.
pub trait Meter: Send + Sync {
    fn record(&self, event: MeterEvent, count: u64, at: DateTime<Utc>);
}

pub struct NoopMeter;

impl Meter for NoopMeter {
    fn record(&self, _event: MeterEvent, _count: u64, _at: DateTime<Utc>) {}
}

/// Keeps per-day event counters in a sorted set.
pub struct StoreMeter {
    db: Arc<dyn Database>,
}

impl StoreMeter {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Counters recorded for one day.
    pub fn counts(&self, day: NaiveDate) -> BookingResult<BTreeMap<String, i64>> {
        let key = day.format(DATE_FORMAT).to_string();
        Ok(self
            .db
            .sorted_set(STATS_TABLE, key.as_bytes())
            .range(0, -1)?
            .into_iter()
            .map(|e| (String::from_utf8_lossy(&e.member).into_owned(), e.score))
            .collect())
    }

    fn increment(&self, event: MeterEvent, count: u64, at: DateTime<Utc>) -> BookingResult<()> {
        let key = date_key(&at);
        let _guard = self.db.lock(&format!("stats:{key}"))?;
        let counters = self.db.sorted_set(STATS_TABLE, key.as_bytes());
        let current = counters
            .score(event.as_str().as_bytes())
            .optional()?
            .unwrap_or(0);
        let delta = i64::try_from(count).unwrap_or(i64::MAX);
        counters.add(event.as_str().as_bytes(), current.saturating_add(delta))?;
        Ok(())
    }
}

impl Meter for StoreMeter {
    fn record(&self, event: MeterEvent, count: u64, at: DateTime<Utc>) {
        if count == 0 {
            return;
        }
        if let Err(e) = self.increment(event, count, at) {
            tracing::warn!(%event, count, error = %e, "dropping meter event");
        }
    }
}
