//! Block-decomposed, bounded-concurrency integer matrix multiplication,
//! verified against a sequential reference over a sweep of block sizes.
//!
//! ```
//! use blockmul::{BenchmarkConfig, BenchmarkRunner, CollectingReporter};
//!
//! let runner = BenchmarkRunner::<i64>::new(
//!     BenchmarkConfig::new().with_matrix_size(6).with_seed(1),
//! )
//! .unwrap();
//! let mut reporter = CollectingReporter::new();
//! let summary = runner.run(&mut reporter).unwrap();
//! assert_eq!(summary.trials.len(), 6);
//! assert!(summary.all_correct());
//! ```

pub mod accumulator;
pub mod error;
pub mod factory;
pub mod matrix;
pub mod partition;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod semaphore;
pub mod sequential;
pub mod task;

pub use accumulator::{LockGranularity, SharedAccumulator};
pub use error::{BlockmulError, Result};
pub use factory::{MatrixFactory, ValueRange};
pub use matrix::{Element, Matrix};
pub use partition::{BlockCoordinate, BlockPartitioner};
pub use report::{CollectingReporter, ConsoleReporter, Reporter};
pub use runner::{BenchmarkConfig, BenchmarkRunner, SweepSummary, TrialResult};
pub use scheduler::{
    AdmissionPolicy, ConcurrentBlockScheduler, FaultInjector, ScheduleReport, SchedulerConfig,
    SchedulingStrategy,
};
pub use sequential::{multiply_sequential, SequentialProduct};

pub const DEFAULT_MATRIX_SIZE: usize = 32;
pub const DEFAULT_CONCURRENCY_CEILING: usize = 64;

pub const DEFAULT_MIN_VALUE: i64 = 1;
pub const DEFAULT_MAX_VALUE: i64 = 100;
