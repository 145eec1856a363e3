//! Cycle schedule configuration from environment variables.
//!
//! The scheduler binary reads how often to trigger billing-cycle runs and
//! an optional day-of-week gate from the environment, so deployments can
//! move the run window without a rebuild.

use crate::errors::{Error, Result};
use chrono::Weekday;
use std::time::Duration;

/// Default trigger interval: once a day.
const DEFAULT_INTERVAL_SECS: u64 = 86_400;

/// How long a generation lock may exist before it is considered abandoned.
const DEFAULT_LOCK_MAX_AGE_SECS: u64 = 3_600;

/// Scheduler settings for the periodic cycle trigger.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// How often the trigger loop fires
    pub interval: Duration,
    /// If set, cycle runs only happen on this weekday
    pub day_of_week_gate: Option<Weekday>,
    /// Generation locks older than this are reaped before each run
    pub lock_max_age: Duration,
}

impl Schedule {
    /// Reads the schedule from `CYCLE_INTERVAL_SECS`, `CYCLE_DAY_OF_WEEK`
    /// (e.g. `"mon"`), and `LOCK_MAX_AGE_SECS`. Every variable is optional.
    pub fn from_env() -> Result<Self> {
        let interval = match std::env::var("CYCLE_INTERVAL_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|e| Error::Config {
                message: format!("CYCLE_INTERVAL_SECS must be an integer: {e}"),
            })?),
            Err(_) => Duration::from_secs(DEFAULT_INTERVAL_SECS),
        };

        let day_of_week_gate = match std::env::var("CYCLE_DAY_OF_WEEK") {
            Ok(raw) => Some(raw.parse::<Weekday>().map_err(|_| Error::Config {
                message: format!("CYCLE_DAY_OF_WEEK is not a weekday: {raw}"),
            })?),
            Err(_) => None,
        };

        let lock_max_age = match std::env::var("LOCK_MAX_AGE_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|e| Error::Config {
                message: format!("LOCK_MAX_AGE_SECS must be an integer: {e}"),
            })?),
            Err(_) => Duration::from_secs(DEFAULT_LOCK_MAX_AGE_SECS),
        };

        Ok(Self {
            interval,
            day_of_week_gate,
            lock_max_age,
        })
    }

    /// Whether a run is allowed on the given weekday under this schedule.
    #[must_use]
    pub fn allows(&self, today: Weekday) -> bool {
        self.day_of_week_gate.is_none_or(|gate| gate == today)
    }
}
