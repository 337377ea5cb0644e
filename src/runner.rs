//! Block-size sweeps.
//!
//! A sweep generates its operands once, computes the sequential reference
//! once and then runs one concurrent trial per block size, comparing every
//! trial's output against the reference.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use crate::accumulator::{LockGranularity, SharedAccumulator};
use crate::error::{validation_error, Result};
use crate::factory::{MatrixFactory, ValueRange};
use crate::matrix::{Element, Matrix};
use crate::partition::BlockPartitioner;
use crate::report::Reporter;
use crate::scheduler::{
    ConcurrentBlockScheduler, FaultInjector, SchedulerConfig, SchedulingStrategy,
};
use crate::sequential::multiply_sequential;
use crate::{
    DEFAULT_CONCURRENCY_CEILING, DEFAULT_MATRIX_SIZE, DEFAULT_MAX_VALUE, DEFAULT_MIN_VALUE,
};

/// Sweep settings.
///
/// # Examples
///
/// ```
/// use blockmul::{AdmissionPolicy, BenchmarkConfig, SchedulingStrategy};
///
/// let config = BenchmarkConfig::new()
///     .with_matrix_size(8)
///     .with_concurrency_ceiling(4)
///     .with_value_range(-10, 10)
///     .with_seed(42)
///     .with_strategy(SchedulingStrategy::ScopedThreads(AdmissionPolicy::OldestFirst));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Side length `N` of every matrix.
    pub matrix_size: usize,
    /// Maximum number of simultaneously running tasks.
    pub concurrency_ceiling: usize,
    /// Inclusive `[min, max]` range input cells are drawn from.
    pub value_range: (i64, i64),
    /// Seed for the input generator; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub strategy: SchedulingStrategy,
    pub granularity: LockGranularity,
    /// Block sizes to run, in order; `None` runs every size from 1 to `N`.
    pub block_sizes: Option<Vec<usize>>,
    pub fault_injector: Option<FaultInjector>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            matrix_size: DEFAULT_MATRIX_SIZE,
            concurrency_ceiling: DEFAULT_CONCURRENCY_CEILING,
            value_range: (DEFAULT_MIN_VALUE, DEFAULT_MAX_VALUE),
            seed: None,
            strategy: SchedulingStrategy::default(),
            granularity: LockGranularity::default(),
            block_sizes: None,
            fault_injector: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrix_size(mut self, n: usize) -> Self {
        self.matrix_size = n;
        self
    }

    pub fn with_concurrency_ceiling(mut self, ceiling: usize) -> Self {
        self.concurrency_ceiling = ceiling;
        self
    }

    pub fn with_value_range(mut self, min: i64, max: i64) -> Self {
        self.value_range = (min, max);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_granularity(mut self, granularity: LockGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_block_sizes(mut self, block_sizes: Vec<usize>) -> Self {
        self.block_sizes = Some(block_sizes);
        self
    }

    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }

    /// Rejects settings no sweep can run with.
    pub fn validate(&self) -> Result<()> {
        if self.matrix_size == 0 {
            return Err(validation_error("matrix size must be at least 1"));
        }
        if self.concurrency_ceiling == 0 {
            return Err(validation_error("concurrency ceiling must be at least 1"));
        }
        let (min, max) = self.value_range;
        if min > max {
            return Err(validation_error(format!(
                "value range minimum {} exceeds maximum {}",
                min, max
            )));
        }
        if let Some(sizes) = &self.block_sizes {
            if sizes.is_empty() {
                return Err(validation_error("at least one block size is required"));
            }
            if let Some(bad) = sizes.iter().find(|&&k| k == 0 || k > self.matrix_size) {
                return Err(validation_error(format!(
                    "block size {} is outside 1..={}",
                    bad, self.matrix_size
                )));
            }
        }
        Ok(())
    }

    /// Block sizes in the order they will run.
    pub fn block_sizes(&self) -> Vec<usize> {
        match &self.block_sizes {
            Some(sizes) => sizes.clone(),
            None => (1..=self.matrix_size).collect(),
        }
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        let config = SchedulerConfig::new()
            .with_ceiling(self.concurrency_ceiling)
            .with_strategy(self.strategy);
        match &self.fault_injector {
            Some(injector) => config.with_fault_injector(injector.clone()),
            None => config,
        }
    }
}

/// Outcome of one block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialResult {
    pub block_size: usize,
    pub blocks_per_dim: usize,
    pub tasks_created: usize,
    pub tasks_completed: usize,
    pub peak_active: usize,
    /// Blocks whose task could not be started.
    pub creation_failures: usize,
    /// First `(row, col)` where the output differed from the reference, if any.
    pub first_mismatch: Option<(usize, usize)>,
    pub elapsed: Duration,
    /// Output equals the sequential reference and every block contributed.
    pub correct: bool,
}

impl TrialResult {
    pub fn elapsed_millis(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// Every trial of one sweep plus the baseline it was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub matrix_size: usize,
    pub concurrency_ceiling: usize,
    pub baseline_elapsed: Duration,
    pub trials: Vec<TrialResult>,
}

impl SweepSummary {
    pub fn all_correct(&self) -> bool {
        self.trials.iter().all(|trial| trial.correct)
    }

    /// Block sizes whose trial was not correct.
    pub fn degraded_trials(&self) -> Vec<usize> {
        self.trials
            .iter()
            .filter(|trial| !trial.correct)
            .map(|trial| trial.block_size)
            .collect()
    }
}

/// Drives sweeps over matrices of element type `T`.
#[derive(Debug)]
pub struct BenchmarkRunner<T: Element = i64> {
    config: BenchmarkConfig,
    scheduler: ConcurrentBlockScheduler,
    _element: PhantomData<T>,
}

impl<T: Element> BenchmarkRunner<T> {
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = ConcurrentBlockScheduler::new(config.scheduler_config())?;
        Ok(BenchmarkRunner {
            config,
            scheduler,
            _element: PhantomData,
        })
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Generates both operands and runs the full sweep over them.
    pub fn run(&self, reporter: &mut dyn Reporter) -> Result<SweepSummary> {
        let mut factory = match self.config.seed {
            Some(seed) => MatrixFactory::seeded(seed),
            None => MatrixFactory::from_entropy(),
        };
        let range = self.value_range()?;
        let n = self.config.matrix_size;

        let a = factory.random(n, range);
        let b = factory.random(n, range);
        self.run_with_matrices(&a, &b, reporter)
    }

    /// Runs the full sweep over caller-supplied operands.
    pub fn run_with_matrices(
        &self,
        a: &Matrix<T>,
        b: &Matrix<T>,
        reporter: &mut dyn Reporter,
    ) -> Result<SweepSummary> {
        let n = self.config.matrix_size;
        a.ensure_size(n, "A")?;
        b.ensure_size(n, "B")?;

        log::info!(
            "sweeping {}x{} product, ceiling {}, {}",
            n,
            n,
            self.config.concurrency_ceiling,
            self.config.strategy
        );

        let baseline = multiply_sequential(a, b)?;
        reporter.baseline(n, baseline.elapsed);

        let mut accumulator = SharedAccumulator::new(n, self.config.granularity);
        let mut trials = Vec::new();
        for block_size in self.config.block_sizes() {
            let result = self.run_trial(block_size, a, b, &baseline.product, &mut accumulator)?;
            reporter.emit(&result);
            trials.push(result);
        }

        let summary = SweepSummary {
            matrix_size: n,
            concurrency_ceiling: self.config.concurrency_ceiling,
            baseline_elapsed: baseline.elapsed,
            trials,
        };
        reporter.finish(&summary);

        log::info!(
            "sweep finished: {} of {} trials correct",
            summary.trials.iter().filter(|t| t.correct).count(),
            summary.trials.len()
        );
        Ok(summary)
    }

    /// Runs one trial: reset, schedule, time, verify.
    pub fn run_trial(
        &self,
        block_size: usize,
        a: &Matrix<T>,
        b: &Matrix<T>,
        reference: &Matrix<T>,
        accumulator: &mut SharedAccumulator<T>,
    ) -> Result<TrialResult> {
        accumulator.reset();
        let partitioner = BlockPartitioner::new(a.size(), block_size)?;

        let start = Instant::now();
        let report = self.scheduler.run(&partitioner, a, b, accumulator)?;
        let elapsed = start.elapsed();

        let first_mismatch = if accumulator.matches(reference)? {
            None
        } else {
            accumulator.snapshot().first_mismatch(reference)
        };
        let creation_failures = report
            .failures
            .iter()
            .filter(|failure| failure.is_degrading())
            .count();

        let correct = first_mismatch.is_none() && !report.is_degraded();
        if let Some((row, col)) = first_mismatch {
            log::warn!(
                "k={}: output differs from the reference at ({}, {}); {} of {} blocks applied",
                block_size,
                row,
                col,
                report.tasks_completed,
                report.coordinates
            );
        } else if !correct {
            log::warn!(
                "k={}: {} of {} blocks applied, {} could not be started",
                block_size,
                report.tasks_completed,
                report.coordinates,
                creation_failures
            );
        }

        Ok(TrialResult {
            block_size,
            blocks_per_dim: partitioner.blocks_per_dim(),
            tasks_created: report.tasks_created,
            tasks_completed: report.tasks_completed,
            peak_active: report.peak_active,
            creation_failures,
            first_mismatch,
            elapsed,
            correct,
        })
    }

    fn value_range(&self) -> Result<ValueRange<T>> {
        let (min, max) = self.config.value_range;
        let convert = |value: i64| {
            <T as num::NumCast>::from(value).ok_or_else(|| {
                validation_error(format!("value {} does not fit the matrix element type", value))
            })
        };
        ValueRange::new(convert(min)?, convert(max)?)
    }
}
