// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Monotonic clock sources.
//!
//! The transport reads time only through [`ClockSource`], in seconds since
//! an arbitrary epoch. [`SystemClock`] is backed by `Instant`; tests drive
//! playback deterministically with [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic real-time clock, in seconds
pub trait ClockSource {
    /// Current time in seconds since the clock's epoch
    fn now(&self) -> f64;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is now
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Convert a clock reading back to an `Instant`
    pub fn instant_at(&self, seconds: f64) -> Instant {
        self.epoch + Duration::from_secs_f64(seconds.max(0.0))
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock
///
/// Clones share the same time, so a test can keep one handle while the
/// transport owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current time
    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Move the clock forward
    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        assert_eq!(clock.now(), 0.0);

        handle.advance(0.025);
        handle.advance(0.025);
        assert!((clock.now() - 0.05).abs() < 1e-12);

        handle.set(3.5);
        assert_eq!(clock.now(), 3.5);
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        thread::sleep(Duration::from_millis(5));
        let second = clock.now();
        assert!(second > first);
        assert!(second >= 0.005);
    }

    #[test]
    fn test_instant_at() {
        let clock = SystemClock::new();
        let instant = clock.instant_at(1.5);
        assert_eq!(instant.duration_since(clock.epoch), Duration::from_millis(1500));
    }
}
