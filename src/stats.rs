//! Run-wide attempt counters.
//!
//! `StatsCollector` is shared by every worker of every round; increments are
//! atomic and counters only grow. `StatsReport` is a point-in-time copy with
//! the derived attempt rate.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::probe::Outcome;

#[derive(Debug)]
pub struct StatsCollector {
    attempts: AtomicU64,
    successes: AtomicU64,
    probe_errors: AtomicU64,
    started: Instant,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            probe_errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Count one finished probe invocation, whatever its outcome.
    pub fn record(&self, outcome: &Outcome) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Success => {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::ProbeError(_) => {
                self.probe_errors.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failure(_) => {}
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> StatsReport {
        StatsReport::new(
            self.attempts(),
            self.successes(),
            self.probe_errors.load(Ordering::Relaxed),
            self.started.elapsed(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub attempts: u64,
    pub successes: u64,
    pub probe_errors: u64,
    pub elapsed: Duration,
    /// Attempts per second; zero when no time has elapsed.
    pub rate: f64,
}

impl StatsReport {
    pub fn new(attempts: u64, successes: u64, probe_errors: u64, elapsed: Duration) -> Self {
        Self {
            attempts,
            successes,
            probe_errors,
            elapsed,
            rate: rate(attempts, elapsed),
        }
    }
}

fn rate(attempts: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        attempts as f64 / secs
    } else {
        0.0
    }
}
