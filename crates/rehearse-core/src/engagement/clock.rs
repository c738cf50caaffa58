//! Clock abstraction for the engagement tracker.
//!
//! The tracker never reads wall-clock time directly; it asks an injected
//! [`Clock`], so tests can drive the window algorithm deterministically
//! with a manual clock instead of real timers.

use chrono::{DateTime, Utc};

/// Source of "now" for the engagement window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
