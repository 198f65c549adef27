//! Injectable time source, so window checks such as the recently-opened
//! media filter can be driven by tests.

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Time passed since `earlier`. Negative if `earlier` lies in the future.
    fn elapsed_since(&self, earlier: DateTime<Utc>) -> Duration {
        self.now() - earlier
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
