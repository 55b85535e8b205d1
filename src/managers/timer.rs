use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Countdown position of a poll, derived from its start time and duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    pub duration_seconds: u64,
    pub expired: bool,
}

impl TimerState {
    pub fn at(now: DateTime<Utc>, start: DateTime<Utc>, duration_seconds: u64) -> Self {
        let elapsed_seconds = (now - start).num_seconds().max(0) as u64;
        let remaining_seconds = duration_seconds.saturating_sub(elapsed_seconds);
        Self {
            elapsed_seconds,
            remaining_seconds,
            duration_seconds,
            expired: remaining_seconds == 0,
        }
    }

    /// Share of the voting window already used, 0 to 100.
    pub fn progress_percentage(&self) -> f64 {
        if self.duration_seconds == 0 {
            return 100.0;
        }
        let used = (self.duration_seconds - self.remaining_seconds) as f64;
        (used / self.duration_seconds as f64 * 100.0).max(0.0).min(100.0)
    }

    /// Never lets `remaining` grow back, e.g. after the wall clock steps backwards.
    pub fn not_after(self, previous: Option<TimerState>) -> Self {
        match previous {
            Some(previous) if previous.remaining_seconds < self.remaining_seconds => previous,
            _ => self,
        }
    }
}

/// `m:ss`, the way the countdown is shown to voters.
pub struct ClockDisplay(pub u64);

impl fmt::Display for ClockDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.0 / 60, self.0 % 60)
    }
}

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

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, seconds: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now = *now + Duration::seconds(seconds);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
