//! Time source for creation and deletion timestamps.

use crate::model::lifecycle::EpochMs;
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies "now" in Unix epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> EpochMs;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> EpochMs {
        (**self).now_ms()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as EpochMs)
            .unwrap_or(0)
    }
}

/// Manually driven clock for deterministic imports.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: Cell<EpochMs>,
}

impl FixedClock {
    pub fn new(now: EpochMs) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: EpochMs) {
        self.now.set(now);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> EpochMs {
        self.now.get()
    }
}
