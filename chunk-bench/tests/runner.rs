use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use chunk_bench::{BenchmarkRunner, TimingFacility, TimingSample};
use chunk_engine::{CahnHilliard, Error, ExecConfig, Kernel, SchedulerKind, SimulationParams};

/// Calls the closure the requested number of times and reports canned durations.
struct FakeTimer {
    durations: Vec<Duration>,
}

impl TimingFacility for FakeTimer {
    fn measure<R, E>(
        &self,
        repetitions: NonZeroUsize,
        mut f: impl FnMut() -> Result<R, E>,
    ) -> Result<(TimingSample, R), E> {
        let mut last = f()?;
        for _ in 1..repetitions.get() {
            last = f()?;
        }
        let durations = self.durations.iter().cycle().take(repetitions.get()).copied().collect();
        Ok((TimingSample::new(durations), last))
    }
}

fn fake(ms: &[u64]) -> FakeTimer {
    FakeTimer {
        durations: ms.iter().map(|m| Duration::from_millis(*m)).collect(),
    }
}

fn reps(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn small() -> SimulationParams {
    SimulationParams::new([4, 8, 8], [1, 8, 8], 3)
}

fn failing_kernel(step: u32) -> Kernel {
    Kernel::FailAtStep {
        step,
        inner: Box::new(Kernel::CahnHilliard(CahnHilliard::default())),
    }
}

fn self_as_worker() -> ExecConfig {
    ExecConfig {
        worker_program: Some(PathBuf::from(env!("CARGO_BIN_EXE_chunk-bench"))),
        worker_args: vec!["--serve-worker".to_string()],
        ..ExecConfig::default()
    }
}

#[test]
fn test_best_of_k_is_the_minimum() {
    let runner = BenchmarkRunner::with_timer(Kernel::default(), ExecConfig::default(), fake(&[5, 2, 7]));

    let rows = runner.run(&small(), SchedulerKind::Threaded, &[2], reps(3)).unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].best, Duration::from_millis(2));
    assert_eq!(rows[0].repetitions, 3);
    assert_eq!(rows[0].worker_count, 2);
    assert_eq!(rows[0].scheduler_kind, SchedulerKind::Threaded);
}

#[test]
fn test_rows_follow_worker_count_order_with_duplicates() {
    let runner = BenchmarkRunner::with_timer(Kernel::default(), ExecConfig::default(), fake(&[1]));

    let rows = runner.run(&small(), SchedulerKind::Threaded, &[2, 1, 2], reps(1)).unwrap();

    let counts: Vec<usize> = rows.iter().map(|r| r.worker_count).collect();
    assert_eq!(counts, vec![2, 1, 2]);
    assert!(rows.iter().all(|r| r.checksum == rows[0].checksum));
}

#[test]
fn test_failing_step_yields_error_and_no_row() {
    let runner = BenchmarkRunner::with_timer(failing_kernel(3), ExecConfig::default(), fake(&[1]));
    let params = SimulationParams::new([8, 20, 20], [1, 20, 20], 5);

    let err = runner.run(&params, SchedulerKind::Threaded, &[1, 2, 4], reps(2)).unwrap_err();

    assert_eq!(err.worker_count, 1);
    assert_eq!(err.scheduler_kind, SchedulerKind::Threaded);
    assert!(matches!(err.cause, Error::WorkerFailure { .. }), "{}", err);
}

#[test]
fn test_zero_workers_aborts_remaining_counts() {
    let runner = BenchmarkRunner::with_timer(Kernel::default(), ExecConfig::default(), fake(&[1]));

    let err = runner.run(&small(), SchedulerKind::Threaded, &[1, 0, 2], reps(1)).unwrap_err();

    assert_eq!(err.worker_count, 0);
    assert!(matches!(err.cause, Error::Execution(_)));
}

#[test]
fn test_suite_continues_after_a_failing_kind() {
    let exec = ExecConfig {
        worker_program: Some(PathBuf::from("/nonexistent/chunk-worker")),
        ..ExecConfig::default()
    };
    let runner = BenchmarkRunner::with_timer(Kernel::default(), exec, fake(&[1]));

    let outcome = runner.run_suite(
        &small(),
        &[SchedulerKind::Multiprocess, SchedulerKind::Threaded],
        &[1, 2],
        reps(1),
    );

    assert!(!outcome.is_success());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].scheduler_kind, SchedulerKind::Multiprocess);
    assert!(matches!(outcome.failures[0].cause, Error::RuntimeCreation(_)));
    assert_eq!(outcome.rows.len(), 2);
    assert!(outcome.rows.iter().all(|r| r.scheduler_kind == SchedulerKind::Threaded));
}

#[test]
fn test_backends_report_identical_checksums() {
    let runner = BenchmarkRunner::new(Kernel::default(), self_as_worker());

    let outcome = runner.run_suite(&small(), &SchedulerKind::ALL, &[1, 2], reps(2));

    assert!(outcome.is_success(), "{:?}", outcome.failures);
    assert_eq!(outcome.rows.len(), 4);
    assert!(outcome.rows.iter().all(|r| r.checksum == outcome.rows[0].checksum));
    assert!(outcome.rows.iter().all(|r| r.repetitions == 2));
}
