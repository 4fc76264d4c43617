use std::ffi::OsStr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use chunk_engine::{ExecConfig, Kernel, SchedulerKind, SimulationParams};

use crate::report::print_report;
use crate::runner::{BenchmarkError, BenchmarkRow, BenchmarkRunner};

/// Flag that turns the `chunk-bench` executable into a process-pool worker.
pub const SERVE_WORKER: &str = "--serve-worker";

const TRIAL_ROUNDS: usize = 3;

/// Point the process backend at `chunk-bench --serve-worker`: the running
/// executable when it is `chunk-bench`, otherwise the one beside it or one
/// directory up (test binaries live under `deps/`). When none is found the
/// backend falls back to its default `chunk-worker` lookup.
pub fn self_serving(mut exec: ExecConfig) -> ExecConfig {
    if let Some(program) = bench_executable() {
        exec.worker_program = Some(program);
        exec.worker_args = vec![SERVE_WORKER.to_string()];
    }
    exec
}

fn bench_executable() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let name = format!("chunk-bench{}", std::env::consts::EXE_SUFFIX);
    if exe.file_name() == Some(OsStr::new(&name)) {
        return Some(exe);
    }
    exe.ancestors()
        .skip(1)
        .take(2)
        .map(|dir| dir.join(&name))
        .find(|p| p.is_file())
}

/// Time one configuration with the default kernel and print it as a one-row
/// table.
pub fn time_trial(
    worker_count: usize,
    kind: SchedulerKind,
    shape: [usize; 3],
    chunk: [usize; 3],
    n_steps: u32,
) -> Result<BenchmarkRow, BenchmarkError> {
    let params = SimulationParams::new(shape, chunk, n_steps);
    let runner = BenchmarkRunner::new(Kernel::default(), self_serving(ExecConfig::default()));
    let rounds = NonZeroUsize::new(TRIAL_ROUNDS).unwrap_or(NonZeroUsize::MIN);

    let mut rows = runner.run(&params, kind, &[worker_count], rounds)?;
    print_report(&rows);
    match rows.pop() {
        Some(row) => Ok(row),
        None => Err(BenchmarkError {
            worker_count,
            scheduler_kind: kind,
            cause: chunk_engine::Error::Execution("trial produced no measurement".to_string()),
        }),
    }
}
