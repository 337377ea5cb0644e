//! Rendering of sweep results.

use std::io::{self, Write};
use std::time::Duration;

use chrono::Local;

use crate::runner::{SweepSummary, TrialResult};

/// Receives the results of a sweep as they are produced.
pub trait Reporter {
    /// Called once, after the sequential reference has been computed.
    fn baseline(&mut self, matrix_size: usize, elapsed: Duration);

    /// Called once per block size, in sweep order.
    fn emit(&mut self, trial: &TrialResult);

    /// Called once after the last trial.
    fn finish(&mut self, _summary: &SweepSummary) {}
}

/// Writes one line per trial to any `io::Write`.
///
/// Output is best-effort: a failed write is logged and the sweep continues.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleReporter::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        ConsoleReporter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(error) = self.out.write_fmt(line).and_then(|_| self.out.write_all(b"\n")) {
            log::warn!("could not write report line: {}", error);
        }
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn baseline(&mut self, matrix_size: usize, elapsed: Duration) {
        let started = Local::now().format("%Y-%m-%d %H:%M:%S %z");
        self.write_line(format_args!("# blockmul sweep started {}", started));
        self.write_line(format_args!(
            "Naive {}x{} : {} ms",
            matrix_size,
            matrix_size,
            elapsed.as_millis()
        ));
    }

    fn emit(&mut self, trial: &TrialResult) {
        self.write_line(format_args!(
            "k={} blocksPerDim={} threadsCreated={} time_ms={} correct={}",
            trial.block_size,
            trial.blocks_per_dim,
            trial.tasks_created,
            trial.elapsed_millis(),
            if trial.correct { "YES" } else { "NO" }
        ));
    }

    fn finish(&mut self, summary: &SweepSummary) {
        let correct = summary.trials.iter().filter(|t| t.correct).count();
        self.write_line(format_args!(
            "# {} of {} trials correct",
            correct,
            summary.trials.len()
        ));
        if let Err(error) = self.out.flush() {
            log::warn!("could not flush report: {}", error);
        }
    }
}

/// Keeps every result in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    pub baseline: Option<(usize, Duration)>,
    pub trials: Vec<TrialResult>,
    pub finished: bool,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for CollectingReporter {
    fn baseline(&mut self, matrix_size: usize, elapsed: Duration) {
        self.baseline = Some((matrix_size, elapsed));
    }

    fn emit(&mut self, trial: &TrialResult) {
        self.trials.push(*trial);
    }

    fn finish(&mut self, _summary: &SweepSummary) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(block_size: usize, correct: bool) -> TrialResult {
        TrialResult {
            block_size,
            blocks_per_dim: 32usize.div_ceil(block_size),
            tasks_created: 32usize.div_ceil(block_size).pow(3),
            tasks_completed: 32usize.div_ceil(block_size).pow(3),
            peak_active: 1,
            creation_failures: 0,
            first_mismatch: if correct { None } else { Some((0, 0)) },
            elapsed: Duration::from_millis(7),
            correct,
        }
    }

    #[test]
    fn test_console_lines_contain_every_field() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.baseline(32, Duration::from_millis(3));
        reporter.emit(&trial(16, true));
        reporter.emit(&trial(5, false));
        reporter.finish(&SweepSummary {
            matrix_size: 32,
            concurrency_ceiling: 64,
            baseline_elapsed: Duration::from_millis(3),
            trials: vec![trial(16, true), trial(5, false)],
        });

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("# blockmul sweep started "));
        assert_eq!(lines[1], "Naive 32x32 : 3 ms");
        assert_eq!(lines[2], "k=16 blocksPerDim=2 threadsCreated=8 time_ms=7 correct=YES");
        assert_eq!(lines[3], "k=5 blocksPerDim=7 threadsCreated=343 time_ms=7 correct=NO");
        assert_eq!(lines[4], "# 1 of 2 trials correct");
    }

    #[test]
    fn test_collecting_reporter() {
        let mut reporter = CollectingReporter::new();
        reporter.baseline(4, Duration::ZERO);
        reporter.emit(&trial(2, true));
        assert_eq!(reporter.baseline, Some((4, Duration::ZERO)));
        assert_eq!(reporter.trials.len(), 1);
        assert!(!reporter.finished);
    }
}
