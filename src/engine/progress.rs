//! Throughput accounting.
//!
//! The rate reported is instantaneous: candidates tested since the previous
//! report divided by the seconds since that report. Reporting resets both.

use std::time::{Duration, Instant};

/// Counters owned by a session.
#[derive(Debug, Clone)]
pub(crate) struct Stats {
    /// Tests since the last progress report
    pub(crate) processed: u64,
    /// Tests over the whole run, including time before a restore
    pub(crate) total_processed: u64,
    /// Start of the current reporting window
    pub(crate) window_start: Instant,
    /// Start of this process' share of the run
    pub(crate) run_start: Instant,
    /// Elapsed time carried over from a checkpoint
    pub(crate) elapsed_baseline: Duration,
}

impl Stats {
    pub(crate) fn new() -> Self {
        let now = Instant::now();
        Self {
            processed: 0,
            total_processed: 0,
            window_start: now,
            run_start: now,
            elapsed_baseline: Duration::ZERO,
        }
    }

    pub(crate) fn resumed(processed: u64, total_processed: u64, elapsed: Duration) -> Self {
        Self {
            processed,
            total_processed,
            elapsed_baseline: elapsed,
            ..Self::new()
        }
    }

    #[inline]
    pub(crate) fn add(&mut self, n: u64) {
        self.processed += n;
        self.total_processed += n;
    }

    /// Total elapsed time of the run.
    pub(crate) fn elapsed(&self) -> Duration {
        self.elapsed_baseline + self.run_start.elapsed()
    }

    /// Close the current window and start a new one.
    pub(crate) fn take_window(&mut self) -> (u64, Duration) {
        let now = Instant::now();
        let window = (self.processed, now.duration_since(self.window_start));
        self.processed = 0;
        self.window_start = now;
        window
    }
}

/// One progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Candidates tested in the reporting window
    pub processed: u64,
    /// Length of the reporting window
    pub window: Duration,
    /// Candidates per second in the window
    pub rate: f64,
    /// Candidates tested since the run started
    pub total_processed: u64,
    /// Candidate being worked on when the report was taken
    pub current: Vec<u8>,
}

impl Progress {
    pub(crate) fn new(
        processed: u64,
        window: Duration,
        total_processed: u64,
        current: Vec<u8>,
    ) -> Self {
        let secs = window.as_secs_f64();
        let rate = if secs > 0.0 { processed as f64 / secs } else { 0.0 };
        Self {
            processed,
            window,
            rate,
            total_processed,
            current,
        }
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Average Speed: {:.1} w/s. Current Word: '{}'",
            self.rate,
            String::from_utf8_lossy(&self.current)
        )
    }
}
