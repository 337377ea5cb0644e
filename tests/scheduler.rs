use blockmul::{
    multiply_sequential, AdmissionPolicy, BlockPartitioner, BlockmulError,
    ConcurrentBlockScheduler, FaultInjector, LockGranularity, MatrixFactory, SchedulerConfig,
    SchedulingStrategy, SharedAccumulator, ValueRange,
};

const STRATEGIES: [SchedulingStrategy; 4] = [
    SchedulingStrategy::ScopedThreads(AdmissionPolicy::AnyCompletion),
    SchedulingStrategy::ScopedThreads(AdmissionPolicy::OldestFirst),
    SchedulingStrategy::ScopedThreads(AdmissionPolicy::DrainAll),
    SchedulingStrategy::WorkerPool,
];

#[test]
fn test_repeated_runs_produce_identical_matrices() {
    let n = 12;
    let range = ValueRange::new(-100i64, 100).unwrap();
    let mut factory = MatrixFactory::seeded(77);
    let a = factory.random(n, range);
    let b = factory.random(n, range);

    for strategy in STRATEGIES {
        let scheduler = ConcurrentBlockScheduler::new(
            SchedulerConfig::new().with_ceiling(8).with_strategy(strategy),
        )
        .unwrap();
        for k in [1, 4, 5, 12] {
            let partitioner = BlockPartitioner::new(n, k).unwrap();
            let mut acc = SharedAccumulator::new(n, LockGranularity::PerRow);

            scheduler.run(&partitioner, &a, &b, &acc).unwrap();
            let first = acc.snapshot();
            acc.reset();
            scheduler.run(&partitioner, &a, &b, &acc).unwrap();
            let second = acc.snapshot();

            assert_eq!(first, second, "{} k={}", strategy, k);
        }
    }
}

#[test]
fn test_running_tasks_never_exceed_ceiling() {
    let range = ValueRange::new(0u64, 9).unwrap();
    let mut factory = MatrixFactory::seeded(1);

    for n in [1, 3, 8, 13] {
        let a = factory.random(n, range);
        let b = factory.random(n, range);
        let expected = multiply_sequential(&a, &b).unwrap().product;

        for ceiling in [1, 2, 7] {
            for strategy in STRATEGIES {
                let scheduler = ConcurrentBlockScheduler::new(
                    SchedulerConfig::new()
                        .with_ceiling(ceiling)
                        .with_strategy(strategy),
                )
                .unwrap();
                for k in 1..=n {
                    let partitioner = BlockPartitioner::new(n, k).unwrap();
                    let acc = SharedAccumulator::new(n, LockGranularity::Global);
                    let report = scheduler.run(&partitioner, &a, &b, &acc).unwrap();

                    assert!(
                        report.peak_active <= ceiling,
                        "n={} k={} ceiling={} {}: peak {}",
                        n,
                        k,
                        ceiling,
                        strategy,
                        report.peak_active
                    );
                    assert_eq!(report.tasks_created, partitioner.blocks_per_dim().pow(3));
                    assert_eq!(acc.snapshot(), expected);
                }
            }
        }
    }
}

#[test]
fn test_block_size_equal_to_n_is_a_single_task() {
    let n = 10;
    let range = ValueRange::new(1i64, 100).unwrap();
    let mut factory = MatrixFactory::seeded(4);
    let a = factory.random(n, range);
    let b = factory.random(n, range);

    let partitioner = BlockPartitioner::new(n, n).unwrap();
    assert_eq!(partitioner.blocks_per_dim(), 1);

    let scheduler = ConcurrentBlockScheduler::new(SchedulerConfig::new()).unwrap();
    let acc = SharedAccumulator::new(n, LockGranularity::Global);
    let report = scheduler.run(&partitioner, &a, &b, &acc).unwrap();

    assert_eq!(report.tasks_created, 1);
    assert_eq!(report.peak_active, 1);
    assert_eq!(acc.snapshot(), multiply_sequential(&a, &b).unwrap().product);
}

#[test]
fn test_block_size_one_is_fully_unblocked() {
    let n = 6;
    let partitioner = BlockPartitioner::new(n, 1).unwrap();
    assert_eq!(partitioner.blocks_per_dim(), n);
    assert_eq!(partitioner.task_count(), n * n * n);
    assert!(partitioner.iter().all(|c| c.extent(n).rows_a.len() == 1));
}

#[test]
fn test_every_creation_failure_is_reported() {
    let n = 4;
    let range = ValueRange::new(1i64, 10).unwrap();
    let mut factory = MatrixFactory::seeded(12);
    let a = factory.random(n, range);
    let b = factory.random(n, range);

    for strategy in STRATEGIES {
        let scheduler = ConcurrentBlockScheduler::new(
            SchedulerConfig::new()
                .with_ceiling(4)
                .with_strategy(strategy)
                .with_fault_injector(FaultInjector::every_nth(4)),
        )
        .unwrap();
        let partitioner = BlockPartitioner::new(n, 1).unwrap();
        let acc = SharedAccumulator::new(n, LockGranularity::Global);
        let report = scheduler.run(&partitioner, &a, &b, &acc).unwrap();

        assert_eq!(report.coordinates, 64);
        assert_eq!(report.failures.len(), 16, "{}", strategy);
        assert_eq!(report.tasks_created, 48);
        assert_eq!(report.tasks_completed, 48);
        assert!(report
            .failures
            .iter()
            .all(|f| matches!(f, BlockmulError::TaskCreationFailure { coordinate: Some(_), .. })));
        assert!(!acc.matches(&multiply_sequential(&a, &b).unwrap().product).unwrap());
    }
}
