//! Clock abstraction for deterministic timestamps.

use chrono::{DateTime, SecondsFormat, Utc};

/// Abstraction over wall-clock time. Log and notification timestamps are
/// taken from here so tests can pin them.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time as an ISO-8601 string with millisecond
    /// precision, the format used on every wire message.
    fn timestamp(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
