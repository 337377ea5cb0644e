use blockmul::{
    AdmissionPolicy, BenchmarkConfig, BenchmarkRunner, CollectingReporter, ConsoleReporter,
    FaultInjector, LockGranularity, Matrix, SchedulingStrategy,
};

fn two_by_two() -> (Matrix<i64>, Matrix<i64>) {
    (
        Matrix::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap(),
        Matrix::from_rows(vec![vec![5, 6], vec![7, 8]]).unwrap(),
    )
}

#[test]
fn test_concrete_two_by_two_scenario() {
    let (a, b) = two_by_two();
    let runner = BenchmarkRunner::<i64>::new(
        BenchmarkConfig::new()
            .with_matrix_size(2)
            .with_concurrency_ceiling(64),
    )
    .unwrap();

    let mut reporter = CollectingReporter::new();
    let summary = runner.run_with_matrices(&a, &b, &mut reporter).unwrap();

    assert_eq!(summary.trials.len(), 2);
    for trial in &summary.trials {
        assert!(trial.correct, "block size {} incorrect", trial.block_size);
    }
    assert_eq!(summary.trials[0].blocks_per_dim, 2);
    assert_eq!(summary.trials[0].tasks_created, 8);
    assert_eq!(summary.trials[1].blocks_per_dim, 1);
    assert_eq!(summary.trials[1].tasks_created, 1);
}

#[test]
fn test_full_default_sweep_is_correct() {
    let runner = BenchmarkRunner::<i64>::new(BenchmarkConfig::new().with_seed(2024)).unwrap();
    let mut reporter = CollectingReporter::new();
    let summary = runner.run(&mut reporter).unwrap();

    assert_eq!(summary.matrix_size, 32);
    assert_eq!(summary.trials.len(), 32);
    for (index, trial) in summary.trials.iter().enumerate() {
        let k = index + 1;
        let blocks = 32usize.div_ceil(k);
        assert_eq!(trial.block_size, k);
        assert_eq!(trial.blocks_per_dim, blocks);
        assert_eq!(trial.tasks_created, blocks.pow(3), "k={}", k);
        assert_eq!(trial.tasks_completed, trial.tasks_created);
        assert!(trial.peak_active <= 64, "k={} peak {}", k, trial.peak_active);
        assert!(trial.correct, "k={} incorrect", k);
    }
    assert_eq!(summary.trials[0].tasks_created, 32 * 32 * 32);
    assert_eq!(summary.trials[31].tasks_created, 1);
}

#[test]
fn test_every_strategy_and_granularity_agrees() {
    let strategies = [
        SchedulingStrategy::ScopedThreads(AdmissionPolicy::AnyCompletion),
        SchedulingStrategy::ScopedThreads(AdmissionPolicy::OldestFirst),
        SchedulingStrategy::ScopedThreads(AdmissionPolicy::DrainAll),
        SchedulingStrategy::WorkerPool,
    ];
    for strategy in strategies {
        for granularity in [LockGranularity::Global, LockGranularity::PerRow] {
            let runner = BenchmarkRunner::<i32>::new(
                BenchmarkConfig::new()
                    .with_matrix_size(9)
                    .with_concurrency_ceiling(5)
                    .with_value_range(-1000, 1000)
                    .with_seed(9)
                    .with_strategy(strategy)
                    .with_granularity(granularity),
            )
            .unwrap();
            let summary = runner.run(&mut CollectingReporter::new()).unwrap();
            assert!(
                summary.all_correct(),
                "{} / {:?}: {:?}",
                strategy,
                granularity,
                summary.degraded_trials()
            );
            assert!(summary.trials.iter().all(|t| t.peak_active <= 5));
        }
    }
}

#[test]
fn test_selected_block_sizes_run_in_order() {
    let runner = BenchmarkRunner::<i64>::new(
        BenchmarkConfig::new()
            .with_matrix_size(10)
            .with_block_sizes(vec![10, 3, 1])
            .with_seed(5),
    )
    .unwrap();
    let summary = runner.run(&mut CollectingReporter::new()).unwrap();
    let sizes: Vec<usize> = summary.trials.iter().map(|t| t.block_size).collect();
    assert_eq!(sizes, vec![10, 3, 1]);
    assert_eq!(summary.trials[1].tasks_created, 64);
}

#[test]
fn test_overflowing_range_still_matches_reference() {
    let runner = BenchmarkRunner::<i32>::new(
        BenchmarkConfig::new()
            .with_matrix_size(6)
            .with_value_range(i32::MAX as i64 - 10, i32::MAX as i64)
            .with_seed(1),
    )
    .unwrap();
    let summary = runner.run(&mut CollectingReporter::new()).unwrap();
    assert!(summary.all_correct());
}

#[test]
fn test_task_creation_failure_degrades_trial_without_aborting() {
    let runner = BenchmarkRunner::<i64>::new(
        BenchmarkConfig::new()
            .with_matrix_size(6)
            .with_concurrency_ceiling(4)
            .with_seed(3)
            .with_block_sizes(vec![1, 2, 3, 6])
            .with_fault_injector(FaultInjector::new(|c| {
                c.block_size == 2 && c.block_row_a == 0 && c.block_col_b == 0 && c.block_col_a == 0
            })),
    )
    .unwrap();

    let mut reporter = CollectingReporter::new();
    let summary = runner.run(&mut reporter).unwrap();

    assert_eq!(summary.trials.len(), 4);
    assert_eq!(summary.degraded_trials(), vec![2]);

    let degraded = &summary.trials[1];
    assert_eq!(degraded.blocks_per_dim, 3);
    assert_eq!(degraded.tasks_created, 26);
    assert_eq!(degraded.tasks_completed, 26);
    assert_eq!(degraded.creation_failures, 1);
    assert_eq!(degraded.first_mismatch, Some((0, 0)));
    assert!(!degraded.correct);

    for trial in summary.trials.iter().filter(|t| t.block_size != 2) {
        assert_eq!(trial.creation_failures, 0);
        assert_eq!(trial.first_mismatch, None);
    }
}

#[test]
fn test_console_report_has_one_line_per_block_size() {
    let runner = BenchmarkRunner::<i64>::new(
        BenchmarkConfig::new().with_matrix_size(4).with_seed(8),
    )
    .unwrap();
    let mut reporter = ConsoleReporter::new(Vec::new());
    runner.run(&mut reporter).unwrap();

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    let trial_lines: Vec<&str> = text.lines().filter(|l| l.starts_with("k=")).collect();
    assert_eq!(trial_lines.len(), 4);
    assert!(trial_lines[0].starts_with("k=1 blocksPerDim=4 threadsCreated=64 "));
    assert!(trial_lines.iter().all(|l| l.ends_with("correct=YES")));
    assert!(text.contains("Naive 4x4 : "));
}
