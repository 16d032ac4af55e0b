use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use common::Clock;

/// Backtest clock. Clones share the same time, so the driver can advance
/// the clock the engine reads.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn clones_share_time() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let clock = SimulatedClock::new(start);
        let engine_view = clock.clone();

        let later = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(engine_view.now(), later);
    }
}
