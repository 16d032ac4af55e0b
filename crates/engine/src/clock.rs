use chrono::{DateTime, Utc};

use common::Clock;

/// Wall-clock time for live and paper trading.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
