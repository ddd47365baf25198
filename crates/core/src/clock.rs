// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Abstracts wall-clock and monotonic time so hold-session ages, VAD
/// timing, and wake-trigger rearm windows can be tested deterministically.
pub trait Clock: Send + Sync + 'static {
    /// Monotonic instant, used for ages and timeouts.
    fn now(&self) -> Instant;
    /// Wall-clock time, used for on-disk timestamps.
    fn system_now(&self) -> SystemTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock whose `now()`/`system_now()` advance only when told to,
/// for tests of rearm windows, staleness checks, and session ages.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<parking_lot::Mutex<FakeClockState>>,
}

struct FakeClockState {
    monotonic: Instant,
    wall: SystemTime,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(parking_lot::Mutex::new(FakeClockState {
                monotonic: Instant::now(),
                wall: SystemTime::now(),
            })),
        }
    }

    pub fn advance(&self, d: Duration) {
        let mut state = self.inner.lock();
        state.monotonic += d;
        state.wall += d;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().monotonic
    }

    fn system_now(&self) -> SystemTime {
        self.inner.lock().wall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_both_timelines() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        let w0 = clock.system_now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - t0, Duration::from_secs(5));
        assert!(clock.system_now() >= w0 + Duration::from_secs(5));
    }
}