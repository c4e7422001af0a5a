//! Progress reporting and cancellation.
//!
//! The orchestrator calls into a [`SliceObserver`] from worker threads, so
//! observers must be `Sync` and should return quickly.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, warn, Level};

/// Pipeline stage a progress report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Triangle/plane intersection (counted in triangles).
    Intersect,
    /// Polygon reconstruction (counted in slices).
    Reconstruct,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Intersect => f.write_str("intersect"),
            Stage::Reconstruct => f.write_str("reconstruct"),
        }
    }
}

/// Receives progress, status messages and cancellation requests.
pub trait SliceObserver: Sync {
    /// `done` of `total` units of `stage` are finished.
    fn progress(&self, _stage: Stage, _done: u64, _total: u64) {}

    /// A status message about the run.
    fn message(&self, _level: Level, _text: &str) {}

    /// Polled between batches and slices; returning true aborts the run.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SliceObserver for NoopObserver {}

/// Observer that forwards to `tracing`, with an optional cancel flag.
#[derive(Debug, Default)]
pub struct TracingObserver {
    cancelled: AtomicBool,
}

impl TracingObserver {
    /// New observer, not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run using this observer.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl SliceObserver for TracingObserver {
    fn progress(&self, stage: Stage, done: u64, total: u64) {
        debug!(%stage, done, total, "progress");
    }

    fn message(&self, level: Level, text: &str) {
        if level == Level::ERROR || level == Level::WARN {
            warn!("{text}");
        } else {
            info!("{text}");
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Shared counter that forwards to an observer every `interval` units.
///
/// Workers call [`ProgressCounter::add`] without coordination; only the
/// call that crosses an interval boundary (or reaches the total) reports.
#[derive(Debug)]
pub struct ProgressCounter {
    stage: Stage,
    done: AtomicU64,
    total: u64,
    interval: u64,
}

impl ProgressCounter {
    /// Counter for `total` units, reporting every `interval` units.
    pub fn new(stage: Stage, total: u64, interval: u64) -> Self {
        Self {
            stage,
            done: AtomicU64::new(0),
            total,
            interval: interval.max(1),
        }
    }

    /// Record `n` finished units.
    pub fn add(&self, n: u64, observer: &dyn SliceObserver) {
        if n == 0 {
            return;
        }
        let before = self.done.fetch_add(n, Ordering::Relaxed);
        let after = before + n;
        if after / self.interval != before / self.interval || after >= self.total {
            observer.progress(self.stage, after.min(self.total), self.total);
        }
    }

    /// Units finished so far.
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Stage, u64, u64)>>,
    }

    impl SliceObserver for Recorder {
        fn progress(&self, stage: Stage, done: u64, total: u64) {
            self.calls.lock().unwrap().push((stage, done, total));
        }
    }

    #[test]
    fn test_counter_throttles() {
        let rec = Recorder::default();
        let counter = ProgressCounter::new(Stage::Intersect, 100, 25);
        for _ in 0..10 {
            counter.add(10, &rec);
        }
        let calls = rec.calls.lock().unwrap();
        // Crossings at 30, 50, 80, 100
        let done: Vec<u64> = calls.iter().map(|c| c.1).collect();
        assert_eq!(done, vec![30, 50, 80, 100]);
        assert!(calls.iter().all(|c| c.0 == Stage::Intersect && c.2 == 100));
        assert_eq!(counter.done(), 100);
    }

    #[test]
    fn test_tracing_observer_cancel() {
        let obs = TracingObserver::new();
        assert!(!obs.is_cancelled());
        obs.cancel();
        assert!(obs.is_cancelled());
        assert!(!NoopObserver.is_cancelled());
    }
}
