use std::process::ExitCode;

use blockmul::{
    AdmissionPolicy, BenchmarkConfig, BenchmarkRunner, ConsoleReporter, LockGranularity,
    SchedulingStrategy, DEFAULT_CONCURRENCY_CEILING, DEFAULT_MATRIX_SIZE, DEFAULT_MAX_VALUE,
    DEFAULT_MIN_VALUE,
};
use clap::{ArgAction, Parser, ValueEnum};

/// Sweep block sizes 1..=N of a concurrent block matrix product and check
/// every trial against a sequential reference.
#[derive(Parser, Debug)]
#[command(name = "blockmul", version, about)]
struct Cli {
    /// Side length N of the square matrices
    #[arg(short = 'n', long = "size", env = "BLOCKMUL_SIZE", default_value_t = DEFAULT_MATRIX_SIZE)]
    size: usize,

    /// Maximum number of simultaneously running tasks
    #[arg(short, long, env = "BLOCKMUL_CEILING", default_value_t = DEFAULT_CONCURRENCY_CEILING)]
    ceiling: usize,

    /// Smallest generated cell value
    #[arg(long, default_value_t = DEFAULT_MIN_VALUE, allow_negative_numbers = true)]
    min: i64,

    /// Largest generated cell value
    #[arg(long, default_value_t = DEFAULT_MAX_VALUE, allow_negative_numbers = true)]
    max: i64,

    /// Seed for the input generator (OS entropy when omitted)
    #[arg(long, env = "BLOCKMUL_SEED")]
    seed: Option<u64>,

    /// How tasks are mapped onto threads
    #[arg(long, value_enum, default_value_t = Strategy::Scoped)]
    strategy: Strategy,

    /// What a scoped-thread sweep waits for at the ceiling
    #[arg(long, value_enum, default_value_t = Admission::Any)]
    admission: Admission,

    /// Exclusion granularity of the output matrix
    #[arg(long, value_enum, default_value_t = Granularity::Global)]
    granularity: Granularity,

    /// Run only these block sizes (repeatable); defaults to every size 1..=N
    #[arg(short = 'k', long = "block-size")]
    block_sizes: Vec<usize>,

    /// Exit with status 1 if any trial is incorrect
    #[arg(long)]
    fail_on_incorrect: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// One scoped thread per block
    Scoped,
    /// Fixed pool of `ceiling` workers
    Pool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Admission {
    /// Admit when any task finishes
    Any,
    /// Join the oldest outstanding task
    Oldest,
    /// Join every outstanding task
    Drain,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Granularity {
    Global,
    Row,
}

impl Cli {
    fn config(&self) -> BenchmarkConfig {
        let strategy = match self.strategy {
            Strategy::Pool => SchedulingStrategy::WorkerPool,
            Strategy::Scoped => SchedulingStrategy::ScopedThreads(match self.admission {
                Admission::Any => AdmissionPolicy::AnyCompletion,
                Admission::Oldest => AdmissionPolicy::OldestFirst,
                Admission::Drain => AdmissionPolicy::DrainAll,
            }),
        };
        let granularity = match self.granularity {
            Granularity::Global => LockGranularity::Global,
            Granularity::Row => LockGranularity::PerRow,
        };

        let mut config = BenchmarkConfig::new()
            .with_matrix_size(self.size)
            .with_concurrency_ceiling(self.ceiling)
            .with_value_range(self.min, self.max)
            .with_strategy(strategy)
            .with_granularity(granularity);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if !self.block_sizes.is_empty() {
            config = config.with_block_sizes(self.block_sizes.clone());
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let runner = match BenchmarkRunner::<i64>::new(cli.config()) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut reporter = ConsoleReporter::stdout();
    match runner.run(&mut reporter) {
        Ok(summary) if cli.fail_on_incorrect && !summary.all_correct() => {
            eprintln!(
                "Error: incorrect trials for block sizes {:?}",
                summary.degraded_trials()
            );
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}
