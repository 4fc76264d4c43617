use std::path::PathBuf;
use std::time::Duration;

pub use chunk_types::{
    Block, CahnHilliard, ChunkSpec, Field, Halo, Job, Kernel, Node, NodeId, SchedulerKind,
    SimulationParams, Task, VolumeShape, STENCIL_REACH,
};

pub mod blocks;
pub mod graph;
pub mod grid;
pub mod kernel;
mod process;
mod schedule;
mod task;
mod threaded;
mod validation;
pub mod worker;

pub use crate::graph::ComputationGraph;
pub use crate::grid::ChunkGrid;
pub use crate::kernel::{StepFailure, StepUpdate};
pub use crate::process::ProcessPool;
pub use crate::task::{run_job, Realized};
pub use crate::threaded::ThreadPool;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad shape / chunk / step combination, raised while building a graph.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("failed to start workers: {0}")]
    RuntimeCreation(#[source] std::io::Error),
    #[error("worker failure in {}: {cause}", describe(.task))]
    WorkerFailure {
        node: Option<NodeId>,
        task: Option<Task>,
        cause: String,
    },
}

fn describe(task: &Option<Task>) -> String {
    match task {
        Some(task) => task.to_string(),
        None => "a worker process".to_string(),
    }
}

impl Error {
    pub(crate) fn worker_failure(graph: &ComputationGraph, node: NodeId, cause: impl Into<String>) -> Self {
        Error::WorkerFailure {
            node: Some(node),
            task: Some(graph.node(node).task),
            cause: cause.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecConfig {
    /// Program serving the worker protocol; defaults to `chunk-worker` next to
    /// the current executable.
    pub worker_program: Option<PathBuf>,
    pub worker_args: Vec<String>,
    pub thread_name_prefix: String,
    /// Abort an execution that has not finished after this long.
    pub timeout: Option<Duration>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            worker_program: None,
            worker_args: vec![],
            thread_name_prefix: "chunk".to_string(),
            timeout: None,
        }
    }
}

/// Realizes a computation graph with some number of workers.
pub trait Scheduler {
    fn kind(&self) -> SchedulerKind;
    fn worker_count(&self) -> usize;
    /// Blocks until every node has completed, or the first failure.
    fn execute(&mut self, graph: &ComputationGraph, kernel: &Kernel) -> Result<Realized, Error>;
}

/// A started backend of either kind.
pub enum Backend {
    Threaded(ThreadPool),
    Multiprocess(ProcessPool),
}

impl Backend {
    /// Start `worker_count` workers of `kind`. Start-up cost is paid here, not
    /// in [`Scheduler::execute`].
    pub fn connect(kind: SchedulerKind, worker_count: usize, config: &ExecConfig) -> Result<Self, Error> {
        match kind {
            SchedulerKind::Threaded => ThreadPool::new(worker_count, config).map(Backend::Threaded),
            SchedulerKind::Multiprocess => ProcessPool::spawn(worker_count, config).map(Backend::Multiprocess),
        }
    }
}

impl Scheduler for Backend {
    fn kind(&self) -> SchedulerKind {
        match self {
            Backend::Threaded(pool) => pool.kind(),
            Backend::Multiprocess(pool) => pool.kind(),
        }
    }

    fn worker_count(&self) -> usize {
        match self {
            Backend::Threaded(pool) => pool.worker_count(),
            Backend::Multiprocess(pool) => pool.worker_count(),
        }
    }

    fn execute(&mut self, graph: &ComputationGraph, kernel: &Kernel) -> Result<Realized, Error> {
        match self {
            Backend::Threaded(pool) => pool.execute(graph, kernel),
            Backend::Multiprocess(pool) => pool.execute(graph, kernel),
        }
    }
}

/// Start a backend, realize `graph` once, and shut the backend down.
pub fn execute(
    graph: &ComputationGraph,
    kernel: &Kernel,
    kind: SchedulerKind,
    worker_count: usize,
    config: &ExecConfig,
) -> Result<Realized, Error> {
    Backend::connect(kind, worker_count, config)?.execute(graph, kernel)
}
