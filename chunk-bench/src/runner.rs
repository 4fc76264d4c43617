use std::num::NonZeroUsize;
use std::time::Duration;

use chunk_engine::{
    Backend, ComputationGraph, ExecConfig, Kernel, Realized, Scheduler, SchedulerKind,
    SimulationParams,
};
use tracing::{info, info_span, warn};

use crate::harness::{BestOf, TimingFacility};

/// One measured trial: the best of `repetitions` timed executions.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkRow {
    pub worker_count: usize,
    pub scheduler_kind: SchedulerKind,
    pub best: Duration,
    pub repetitions: usize,
    /// FNV-1a over the bits of the final response field.
    pub checksum: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("{scheduler_kind} trial with {worker_count} workers failed: {cause}")]
pub struct BenchmarkError {
    pub worker_count: usize,
    pub scheduler_kind: SchedulerKind,
    #[source]
    pub cause: chunk_engine::Error,
}

/// Rows from every kind that completed, plus the first failure of each kind
/// that did not.
#[derive(Debug, Default)]
pub struct SuiteOutcome {
    pub rows: Vec<BenchmarkRow>,
    pub failures: Vec<BenchmarkError>,
}

impl SuiteOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct BenchmarkRunner<T = BestOf> {
    kernel: Kernel,
    exec: ExecConfig,
    timer: T,
}

impl BenchmarkRunner<BestOf> {
    pub fn new(kernel: Kernel, exec: ExecConfig) -> Self {
        Self::with_timer(kernel, exec, BestOf::new())
    }
}

impl<T: TimingFacility> BenchmarkRunner<T> {
    pub fn with_timer(kernel: Kernel, exec: ExecConfig, timer: T) -> Self {
        Self { kernel, exec, timer }
    }

    /// Measure `params` under `kind` once per entry of `worker_counts`, in
    /// order. The first failure stops the remaining worker counts.
    pub fn run(
        &self,
        params: &SimulationParams,
        kind: SchedulerKind,
        worker_counts: &[usize],
        repetitions: NonZeroUsize,
    ) -> Result<Vec<BenchmarkRow>, BenchmarkError> {
        let mut rows = Vec::with_capacity(worker_counts.len());
        for &worker_count in worker_counts {
            let row = self.trial(params, kind, worker_count, repetitions).map_err(|cause| {
                warn!(kind = %kind, worker_count, error = %cause, "trial_failed");
                BenchmarkError {
                    worker_count,
                    scheduler_kind: kind,
                    cause,
                }
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// [`run`](Self::run) for each kind in turn. A failing kind keeps the rows
    /// it finished and does not stop the next kind.
    pub fn run_suite(
        &self,
        params: &SimulationParams,
        kinds: &[SchedulerKind],
        worker_counts: &[usize],
        repetitions: NonZeroUsize,
    ) -> SuiteOutcome {
        let mut outcome = SuiteOutcome::default();
        for &kind in kinds {
            for &worker_count in worker_counts {
                match self.run(params, kind, &[worker_count], repetitions) {
                    Ok(rows) => outcome.rows.extend(rows),
                    Err(e) => {
                        outcome.failures.push(e);
                        break;
                    }
                }
            }
        }
        outcome
    }

    fn trial(
        &self,
        params: &SimulationParams,
        kind: SchedulerKind,
        worker_count: usize,
        repetitions: NonZeroUsize,
    ) -> Result<BenchmarkRow, chunk_engine::Error> {
        let _span = info_span!("trial", kind = %kind, worker_count).entered();

        let graph = ComputationGraph::build(params)?;
        let mut backend = Backend::connect(kind, worker_count, &self.exec)?;

        let (sample, realized) = self
            .timer
            .measure(repetitions, || backend.execute(&graph, &self.kernel))?;
        let best = sample.best().unwrap_or_default();
        let checksum = response_checksum(&realized);

        info!(
            best_ms = best.as_secs_f64() * 1000.0,
            repetitions = sample.repetitions(),
            checksum,
            "trial_done"
        );

        Ok(BenchmarkRow {
            worker_count,
            scheduler_kind: kind,
            best,
            repetitions: sample.repetitions(),
            checksum,
        })
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the bit patterns of the response field, so equal fields hash
/// equal only when they are bit-identical.
pub fn response_checksum(realized: &Realized) -> u64 {
    realized.response.iter().fold(FNV_OFFSET, |hash, v| {
        v.to_bits()
            .to_le_bytes()
            .iter()
            .fold(hash, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
    })
}
