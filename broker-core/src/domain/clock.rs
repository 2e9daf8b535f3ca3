// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Injectable wall-clock and id generation. Every component that needs
//! "now" or a fresh UUID takes one of these via constructor injection
//! rather than calling `Utc::now()` / `Uuid::new_v4()` directly, so tests
//! can pin time and identifiers deterministically.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub trait IdGen: Send + Sync {
    fn new_uuid(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Gen;

impl IdGen for UuidV4Gen {
    fn new_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Mutable clock for tests, advanced explicitly (scenario S6 issues at t=0,
/// validates at t=100, revokes at t=200, validates again at t=300).
pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn at(start: DateTime<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.0.lock().unwrap() = to;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_monotonically_on_demand() {
        let start = Utc::now();
        let clock = TestClock::at(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(100));
        assert_eq!(clock.now(), start + Duration::seconds(100));
    }
}
