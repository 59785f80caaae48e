use crate::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current time for every ledger mutation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and by the CSV replay, where `wait` commands advance time
/// deterministically instead of sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock by `by`. Fails without moving if the result would
    /// leave the representable date range.
    pub fn advance(&self, by: Duration) -> Result<()> {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        let moved = now.checked_add_signed(by).ok_or_else(|| {
            LedgerError::Validation(format!("cannot move the clock by {by} from {}", *now))
        })?;
        *now = moved;
        Ok(())
    }

    pub fn advance_secs(&self, secs: i64) -> Result<()> {
        let by = Duration::try_seconds(secs)
            .ok_or_else(|| LedgerError::Validation(format!("{secs} seconds is out of range")))?;
        self.advance(by)
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
