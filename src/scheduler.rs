//! Bounded-concurrency execution of block tasks.
//!
//! The scheduler walks a [`BlockPartitioner`] in order, starts one task per
//! coordinate and never lets more than `ceiling` tasks run at once. Every task
//! is joined before [`ConcurrentBlockScheduler::run`] returns: threads are
//! spawned into a `std::thread::scope` or a `rayon` scope, so no task can
//! outlive the trial that created it.
//!
//! A coordinate whose task cannot be started is logged, recorded in the
//! [`ScheduleReport`] and skipped. The trial carries on with an incomplete
//! output, which the correctness check then reports.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, Scope, ScopedJoinHandle};

use crate::accumulator::SharedAccumulator;
use crate::error::{task_creation_failure, validation_error, BlockmulError, Result};
use crate::matrix::{Element, Matrix};
use crate::partition::{BlockCoordinate, BlockPartitioner};
use crate::semaphore::{ActivityGauge, CountingSemaphore};
use crate::task::BlockTask;
use crate::DEFAULT_CONCURRENCY_CEILING;

/// What the scheduler waits for when `ceiling` tasks are already admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdmissionPolicy {
    /// Admit as soon as any running task finishes.
    #[default]
    AnyCompletion,
    /// Join the earliest-admitted outstanding task, even if later ones are done.
    OldestFirst,
    /// Join every outstanding task, then admit a fresh batch.
    DrainAll,
}

/// How tasks are mapped onto threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One scoped OS thread per task.
    ScopedThreads(AdmissionPolicy),
    /// A `rayon` pool with exactly `ceiling` worker threads fed by a task queue.
    WorkerPool,
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::ScopedThreads(AdmissionPolicy::default())
    }
}

impl fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingStrategy::ScopedThreads(AdmissionPolicy::AnyCompletion) => {
                f.write_str("scoped threads, admit on any completion")
            }
            SchedulingStrategy::ScopedThreads(AdmissionPolicy::OldestFirst) => {
                f.write_str("scoped threads, join oldest first")
            }
            SchedulingStrategy::ScopedThreads(AdmissionPolicy::DrainAll) => {
                f.write_str("scoped threads, drain all at ceiling")
            }
            SchedulingStrategy::WorkerPool => f.write_str("worker pool"),
        }
    }
}

/// Simulates resource exhaustion when starting tasks.
///
/// The predicate is consulted once per coordinate, right before its task would
/// be started; returning `true` makes that start fail.
#[derive(Clone)]
pub struct FaultInjector {
    should_fail: Arc<dyn Fn(&BlockCoordinate) -> bool + Send + Sync>,
}

impl FaultInjector {
    pub fn new(should_fail: impl Fn(&BlockCoordinate) -> bool + Send + Sync + 'static) -> Self {
        FaultInjector {
            should_fail: Arc::new(should_fail),
        }
    }

    /// Fails every `n`th task start. The count runs across every trial the
    /// injector is used in. `n == 0` never fails.
    pub fn every_nth(n: usize) -> Self {
        let starts = AtomicUsize::new(0);
        FaultInjector::new(move |_| n > 0 && (starts.fetch_add(1, Ordering::Relaxed) + 1) % n == 0)
    }

    pub fn fails(&self, coordinate: &BlockCoordinate) -> bool {
        (self.should_fail)(coordinate)
    }
}

impl fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultInjector").finish_non_exhaustive()
    }
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of simultaneously running tasks.
    pub ceiling: usize,
    pub strategy: SchedulingStrategy,
    pub fault_injector: Option<FaultInjector>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            ceiling: DEFAULT_CONCURRENCY_CEILING,
            strategy: SchedulingStrategy::default(),
            fault_injector: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_fault_injector(mut self, injector: FaultInjector) -> Self {
        self.fault_injector = Some(injector);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ceiling == 0 {
            return Err(validation_error("concurrency ceiling must be at least 1"));
        }
        Ok(())
    }
}

/// Outcome of scheduling one trial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Coordinates the partitioner produced.
    pub coordinates: usize,
    /// Tasks that were successfully started.
    pub tasks_created: usize,
    /// Tasks that ran to completion and applied their partial product.
    pub tasks_completed: usize,
    /// Highest number of tasks observed running at the same time.
    pub peak_active: usize,
    /// Task creation failures and task errors, in the order they were seen.
    pub failures: Vec<BlockmulError>,
}

impl ScheduleReport {
    /// `true` when at least one coordinate did not contribute to the output.
    pub fn is_degraded(&self) -> bool {
        self.tasks_completed < self.coordinates
    }
}

/// Shared, per-trial state every task borrows.
struct Trial<'a, T: Element> {
    a: &'a Matrix<T>,
    b: &'a Matrix<T>,
    accumulator: &'a SharedAccumulator<T>,
    gauge: ActivityGauge,
    completed: AtomicUsize,
    failures: Mutex<Vec<BlockmulError>>,
}

impl<T: Element> Trial<'_, T> {
    fn execute(&self, coordinate: BlockCoordinate) {
        let _running = self.gauge.enter();
        let mut task = BlockTask::new(coordinate);

        match panic::catch_unwind(AssertUnwindSafe(|| {
            task.run(self.a, self.b, self.accumulator)
        })) {
            Ok(Ok(())) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(Err(error)) => {
                log::warn!("task {} failed: {}", task.coordinate(), error);
                self.record(error);
            }
            Err(_) => {
                log::warn!(
                    "task {} panicked while {}; its contribution is lost",
                    task.coordinate(),
                    task.state()
                );
            }
        }
    }

    fn record(&self, error: BlockmulError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    fn creation_failed(&self, coordinate: BlockCoordinate, error: io::Error) {
        log::warn!("could not start task {}: {}; skipping it", coordinate, error);
        self.record(task_creation_failure(Some(coordinate), error.to_string()));
    }
}

/// Runs every block of a partition concurrently under a fixed ceiling.
#[derive(Debug, Clone)]
pub struct ConcurrentBlockScheduler {
    config: SchedulerConfig,
}

impl ConcurrentBlockScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(ConcurrentBlockScheduler { config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Schedules one task per coordinate of `partitioner` and blocks until all
    /// of them have finished.
    ///
    /// Fails only on a size disagreement between the operands, the accumulator
    /// and the partitioner, before any task starts. Task creation failures are
    /// reported in the returned [`ScheduleReport`].
    pub fn run<T: Element>(
        &self,
        partitioner: &BlockPartitioner,
        a: &Matrix<T>,
        b: &Matrix<T>,
        accumulator: &SharedAccumulator<T>,
    ) -> Result<ScheduleReport> {
        let n = partitioner.matrix_size();
        a.ensure_size(n, "A")?;
        b.ensure_size(n, "B")?;
        accumulator.ensure_size(n)?;

        log::debug!(
            "scheduling {} tasks (k={}, ceiling={}, {}, {:?} locking)",
            partitioner.task_count(),
            partitioner.block_size(),
            self.config.ceiling,
            self.config.strategy,
            accumulator.granularity()
        );

        let trial = Trial {
            a,
            b,
            accumulator,
            gauge: ActivityGauge::new(),
            completed: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        };

        let tasks_created = match self.config.strategy {
            SchedulingStrategy::ScopedThreads(policy) => {
                self.run_scoped(partitioner, &trial, policy)
            }
            SchedulingStrategy::WorkerPool => self.run_pool(partitioner, &trial),
        };

        let report = ScheduleReport {
            coordinates: partitioner.task_count(),
            tasks_created,
            tasks_completed: trial.completed.load(Ordering::SeqCst),
            peak_active: trial.gauge.peak(),
            failures: trial
                .failures
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        };

        log::debug!(
            "k={}: {} of {} tasks completed, peak {} running",
            partitioner.block_size(),
            report.tasks_completed,
            report.coordinates,
            report.peak_active
        );

        Ok(report)
    }

    fn run_scoped<T: Element>(
        &self,
        partitioner: &BlockPartitioner,
        trial: &Trial<'_, T>,
        policy: AdmissionPolicy,
    ) -> usize {
        let ceiling = self.config.ceiling;
        let semaphore = CountingSemaphore::new(ceiling);
        let mut created = 0;

        thread::scope(|scope| match policy {
            AdmissionPolicy::AnyCompletion => {
                for coordinate in partitioner {
                    let permit = semaphore.acquire();
                    // The permit is released when the task exits, or right
                    // here if the closure is dropped unspawned.
                    let work = move || {
                        let _permit = permit;
                        trial.execute(coordinate);
                    };
                    match self.spawn(scope, coordinate, work) {
                        Ok(_) => created += 1,
                        Err(error) => trial.creation_failed(coordinate, error),
                    }
                }
            }
            AdmissionPolicy::OldestFirst => {
                let mut outstanding = VecDeque::with_capacity(ceiling);
                for coordinate in partitioner {
                    while outstanding.len() >= ceiling {
                        if let Some(oldest) = outstanding.pop_front() {
                            join(oldest);
                        }
                    }
                    match self.spawn(scope, coordinate, move || trial.execute(coordinate)) {
                        Ok(handle) => {
                            outstanding.push_back(handle);
                            created += 1;
                        }
                        Err(error) => trial.creation_failed(coordinate, error),
                    }
                }
                outstanding.into_iter().for_each(join);
            }
            AdmissionPolicy::DrainAll => {
                let mut outstanding = Vec::with_capacity(ceiling);
                for coordinate in partitioner {
                    if outstanding.len() >= ceiling {
                        outstanding.drain(..).for_each(join);
                    }
                    match self.spawn(scope, coordinate, move || trial.execute(coordinate)) {
                        Ok(handle) => {
                            outstanding.push(handle);
                            created += 1;
                        }
                        Err(error) => trial.creation_failed(coordinate, error),
                    }
                }
                outstanding.into_iter().for_each(join);
            }
        });

        created
    }

    fn run_pool<T: Element>(&self, partitioner: &BlockPartitioner, trial: &Trial<'_, T>) -> usize {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.ceiling)
            .thread_name(|index| format!("blockmul-worker-{}", index))
            .build()
        {
            Ok(pool) => pool,
            Err(error) => {
                log::warn!("could not build a {}-thread pool: {}", self.config.ceiling, error);
                trial.record(task_creation_failure(None, error.to_string()));
                return 0;
            }
        };

        let injector = self.config.fault_injector.as_ref();
        let mut created = 0;
        pool.scope(|scope| {
            for coordinate in partitioner {
                if injector.is_some_and(|injector| injector.fails(&coordinate)) {
                    trial.creation_failed(coordinate, injected_failure());
                    continue;
                }
                scope.spawn(move |_| trial.execute(coordinate));
                created += 1;
            }
        });

        created
    }

    fn spawn<'scope, 'env, F>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        coordinate: BlockCoordinate,
        work: F,
    ) -> io::Result<ScopedJoinHandle<'scope, ()>>
    where
        F: FnOnce() + Send + 'scope,
    {
        if let Some(injector) = &self.config.fault_injector {
            if injector.fails(&coordinate) {
                return Err(injected_failure());
            }
        }

        thread::Builder::new()
            .name(format!(
                "block-{}-{}-{}",
                coordinate.block_row_a, coordinate.block_col_b, coordinate.block_col_a
            ))
            .spawn_scoped(scope, work)
    }
}

fn injected_failure() -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, "injected resource exhaustion")
}

fn join(handle: ScopedJoinHandle<'_, ()>) {
    if handle.join().is_err() {
        log::warn!("a block task terminated abnormally");
    }
}
