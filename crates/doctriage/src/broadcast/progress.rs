//! Throughput and ETA arithmetic.
//!
//! The clock freezes (never resets) across a pause/resume cycle: on resume
//! the reference start instant is shifted forward by the paused duration,
//! so elapsed time — and with it speed and ETA — continues exactly where it
//! left off. Elapsed time increases only while running.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Pause-aware elapsed-time clock.
#[derive(Debug, Default)]
pub struct ProgressClock {
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
}

impl ProgressClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the clock from zero.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.paused_at = None;
    }

    /// Freezes the elapsed counter. No-op if not running.
    pub fn pause(&mut self) {
        if self.started_at.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// Unfreezes the clock: the start instant is shifted by the paused
    /// duration so elapsed time continues from its pre-pause value.
    pub fn resume(&mut self) {
        if let (Some(started), Some(paused)) = (self.started_at, self.paused_at.take()) {
            self.started_at = Some(started + paused.elapsed());
        }
    }

    /// Stops and clears the clock.
    pub fn reset(&mut self) {
        self.started_at = None;
        self.paused_at = None;
    }

    /// Elapsed running time. Zero before the first start; frozen while
    /// paused.
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.paused_at) {
            (Some(started), Some(paused)) => paused.duration_since(started),
            (Some(started), None) => started.elapsed(),
            (None, _) => Duration::ZERO,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.paused_at.is_none()
    }
}

/// A point-in-time progress reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Items that have left the pending pool this batch (completed, failed
    /// or skipped — a skip drains an item too).
    pub current: u64,
    pub total: u64,
    pub elapsed_secs: f64,
    pub items_per_second: f64,
    /// None until at least one item has been drained.
    pub eta_secs: Option<f64>,
}

/// Derives throughput and ETA readings from the clock and item counts.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    clock: ProgressClock,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.clock.start();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    pub fn reset(&mut self) {
        self.clock.reset();
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Computes a reading for `current` drained items out of `total`.
    pub fn snapshot(&self, current: u64, total: u64) -> ProgressSnapshot {
        let elapsed_secs = self.clock.elapsed().as_secs_f64();
        let items_per_second = if current > 0 && elapsed_secs > 0.0 {
            current as f64 / elapsed_secs
        } else {
            0.0
        };
        let remaining = total.saturating_sub(current);
        let eta_secs = if items_per_second > 0.0 {
            Some(remaining as f64 / items_per_second)
        } else {
            None
        };

        ProgressSnapshot {
            current,
            total,
            elapsed_secs,
            items_per_second,
            eta_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_clock_zero_before_start() {
        let clock = ProgressClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_clock_advances_while_running() {
        let mut clock = ProgressClock::new();
        clock.start();
        sleep(Duration::from_millis(20));
        assert!(clock.elapsed() >= Duration::from_millis(20));
        assert!(clock.is_running());
    }

    #[test]
    fn test_elapsed_frozen_across_pause_resume() {
        let mut clock = ProgressClock::new();
        clock.start();
        sleep(Duration::from_millis(30));
        clock.pause();

        let before = clock.elapsed();
        sleep(Duration::from_millis(40));
        // Frozen while paused.
        assert_eq!(clock.elapsed(), before);

        clock.resume();
        let after = clock.elapsed();
        // Continues from the pre-pause value: the paused 40ms never count.
        assert!(after >= before);
        assert!(after < before + Duration::from_millis(35));
    }

    #[test]
    fn test_restart_resets_elapsed() {
        let mut clock = ProgressClock::new();
        clock.start();
        sleep(Duration::from_millis(20));
        clock.start();
        assert!(clock.elapsed() < Duration::from_millis(15));
    }

    #[test]
    fn test_pause_when_idle_is_noop() {
        let mut clock = ProgressClock::new();
        clock.pause();
        clock.resume();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_snapshot_before_any_items() {
        let mut tracker = ProgressTracker::new();
        tracker.start();
        let snap = tracker.snapshot(0, 5);
        assert_eq!(snap.current, 0);
        assert_eq!(snap.total, 5);
        assert_eq!(snap.items_per_second, 0.0);
        assert!(snap.eta_secs.is_none());
    }

    #[test]
    fn test_snapshot_throughput_and_eta() {
        let mut tracker = ProgressTracker::new();
        tracker.start();
        sleep(Duration::from_millis(50));
        let snap = tracker.snapshot(2, 6);

        assert!(snap.elapsed_secs > 0.0);
        assert!(snap.items_per_second > 0.0);
        let eta = snap.eta_secs.unwrap();
        // 4 remaining at the measured rate.
        let expected = 4.0 / snap.items_per_second;
        assert!((eta - expected).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_complete_batch_eta_zero() {
        let mut tracker = ProgressTracker::new();
        tracker.start();
        sleep(Duration::from_millis(10));
        let snap = tracker.snapshot(3, 3);
        assert_eq!(snap.eta_secs, Some(0.0));
    }
}
