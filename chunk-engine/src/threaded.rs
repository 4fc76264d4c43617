use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chunk_types::{Kernel, NodeId, SchedulerKind};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use tracing::{debug, warn};

use crate::graph::ComputationGraph;
use crate::schedule::Frontier;
use crate::task::{self, Realized, Value};
use crate::{Error, ExecConfig, Scheduler};

/// Shared-memory backend: a rayon pool of `workers` threads. The calling
/// thread coordinates and never runs tasks itself.
pub struct ThreadPool {
    pool: rayon::ThreadPool,
    workers: usize,
    timeout: Option<Duration>,
}

impl ThreadPool {
    pub fn new(workers: usize, config: &ExecConfig) -> Result<Self, Error> {
        if workers < 1 {
            return Err(Error::Execution(format!("worker_count must be at least 1, got {}", workers)));
        }
        let prefix = config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()
            .map_err(|e| Error::Execution(format!("failed to build thread pool: {}", e)))?;
        debug!(workers, "thread_pool_started");
        Ok(Self {
            pool,
            workers,
            timeout: config.timeout,
        })
    }
}

impl Scheduler for ThreadPool {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Threaded
    }

    fn worker_count(&self) -> usize {
        self.workers
    }

    fn execute(&mut self, graph: &ComputationGraph, kernel: &Kernel) -> Result<Realized, Error> {
        let mut frontier = Frontier::new(graph);
        let (tx, rx) = unbounded::<(NodeId, Result<Value, Error>)>();
        let mut deadline = self.timeout.map(|t| Instant::now() + t);
        let mut failure: Option<Error> = None;
        let mut in_flight = 0usize;

        self.pool.in_place_scope(|scope| loop {
            // recv_deadline hands back queued completions even past the deadline.
            if deadline.is_some_and(|at| Instant::now() >= at) {
                warn!(in_flight, "deadline_exceeded");
                failure.get_or_insert(Error::Execution("execution deadline exceeded".into()));
                // Running tasks cannot be interrupted; wait for them without a deadline.
                deadline = None;
            }

            if failure.is_none() {
                while let Some(id) = frontier.next_ready() {
                    let inputs = frontier.inputs(id);
                    let tx = tx.clone();
                    in_flight += 1;
                    debug!(node = id.0, "task_dispatch");
                    scope.spawn(move |_| {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                            task::evaluate(graph, id, &inputs, kernel)
                        }))
                        .unwrap_or_else(|_| Err(Error::worker_failure(graph, id, "task panicked")));
                        drop(inputs);
                        let _ = tx.send((id, outcome));
                    });
                }
            }

            if in_flight == 0 {
                break;
            }

            let received = match deadline {
                Some(at) => rx.recv_deadline(at),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((id, Ok(value))) => {
                    in_flight -= 1;
                    debug!(node = id.0, "task_done");
                    if failure.is_none() {
                        frontier.complete(id, value);
                    }
                }
                Ok((id, Err(e))) => {
                    in_flight -= 1;
                    warn!(node = id.0, error = %e, "task_failed");
                    failure.get_or_insert(e);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    failure.get_or_insert(Error::Execution("task channel closed".into()));
                    break;
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        if !frontier.is_done() {
            return Err(Error::Execution(format!(
                "graph stalled after {} of {} nodes",
                frontier.completed(),
                graph.node_count()
            )));
        }
        frontier
            .take_output()
            .ok_or_else(|| Error::Execution("root node produced no output".into()))
    }
}
