use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chunk_types::{Kernel, SchedulerKind, WorkerReply, WorkerRequest};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::graph::ComputationGraph;
use crate::schedule::Frontier;
use crate::task::{self, Realized, Value};
use crate::{Error, ExecConfig, Scheduler};

struct WorkerProcess {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    reader: Option<JoinHandle<()>>,
}

impl WorkerProcess {
    fn send(&mut self, request: &WorkerRequest) -> Result<(), String> {
        let stdin = self.stdin.as_mut().ok_or("worker input closed")?;
        bincode::serialize_into(&mut *stdin, request).map_err(|e| e.to_string())?;
        stdin.flush().map_err(|e| e.to_string())
    }
}

type Reply = (usize, Result<WorkerReply, String>);

/// Isolated backend: `workers` child processes serving the worker protocol.
/// Jobs and results are copied across the process boundary with bincode.
pub struct ProcessPool {
    workers: Vec<WorkerProcess>,
    replies: Receiver<Reply>,
    timeout: Option<Duration>,
    broken: bool,
}

impl ProcessPool {
    pub fn spawn(workers: usize, config: &ExecConfig) -> Result<Self, Error> {
        if workers < 1 {
            return Err(Error::Execution(format!("worker_count must be at least 1, got {}", workers)));
        }
        let program = match &config.worker_program {
            Some(p) => p.clone(),
            None => default_worker_program()?,
        };

        let (tx, rx) = unbounded::<Reply>();
        let mut pool = Self {
            workers: Vec::with_capacity(workers),
            replies: rx,
            timeout: config.timeout,
            broken: false,
        };

        for index in 0..workers {
            let mut child = Command::new(&program)
                .args(&config.worker_args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(Error::RuntimeCreation)?;

            let stdin = child.stdin.take().map(BufWriter::new);
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| Error::Execution("worker stdout was not captured".into()))?;
            let tx = tx.clone();
            let reader = thread::Builder::new()
                .name(format!("{}-reader-{}", config.thread_name_prefix, index))
                .spawn(move || {
                    let mut stdout = BufReader::new(stdout);
                    loop {
                        match bincode::deserialize_from::<_, WorkerReply>(&mut stdout) {
                            Ok(reply) => {
                                if tx.send((index, Ok(reply))).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                let _ = tx.send((index, Err(e.to_string())));
                                break;
                            }
                        }
                    }
                })
                .map_err(Error::RuntimeCreation)?;

            pool.workers.push(WorkerProcess {
                child,
                stdin,
                reader: Some(reader),
            });
        }

        info!(workers, program = %program.display(), "process_pool_started");
        Ok(pool)
    }

    fn kill_all(&mut self) {
        for worker in &mut self.workers {
            let _ = worker.child.kill();
        }
        self.broken = true;
    }
}

/// The `chunk-worker` binary next to the running executable, or one directory
/// up when the executable is a test binary under `deps/`.
fn default_worker_program() -> Result<PathBuf, Error> {
    let exe = std::env::current_exe().map_err(Error::RuntimeCreation)?;
    let name = format!("chunk-worker{}", std::env::consts::EXE_SUFFIX);
    let mut candidates = exe.ancestors().skip(1).take(2).map(|dir| dir.join(&name));
    let nearest = candidates
        .next()
        .ok_or_else(|| Error::Execution("executable has no parent directory".into()))?;
    Ok(std::iter::once(nearest.clone())
        .chain(candidates)
        .find(|p| p.is_file())
        .unwrap_or(nearest))
}

impl Scheduler for ProcessPool {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Multiprocess
    }

    fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn execute(&mut self, graph: &ComputationGraph, kernel: &Kernel) -> Result<Realized, Error> {
        if self.broken {
            return Err(Error::Execution("process pool lost a worker and cannot be reused".into()));
        }

        let configure = WorkerRequest::Configure(kernel.clone());
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Err(e) = worker.send(&configure) {
                warn!(worker = index, error = %e, "worker_lost");
                self.kill_all();
                return Err(Error::WorkerFailure {
                    node: None,
                    task: None,
                    cause: format!("worker {} unreachable: {}", index, e),
                });
            }
        }

        let mut frontier = Frontier::new(graph);
        let mut idle: Vec<usize> = (0..self.workers.len()).rev().collect();
        let mut in_flight = 0usize;
        let mut failure: Option<Error> = None;
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            // recv_deadline hands back queued replies even past the deadline.
            if deadline.is_some_and(|at| Instant::now() >= at) {
                warn!(in_flight, "deadline_exceeded");
                self.kill_all();
                failure.get_or_insert(Error::Execution("execution deadline exceeded".into()));
                break;
            }

            while failure.is_none() {
                let Some(id) = frontier.next_ready() else { break };
                let inputs = frontier.inputs(id);
                if task::is_reduction(graph.node(id).task) {
                    match task::reduce(graph, id, &inputs) {
                        Ok(value) => frontier.complete(id, value),
                        Err(e) => failure = Some(e),
                    }
                    continue;
                }
                let Some(index) = idle.pop() else {
                    frontier.requeue(id);
                    break;
                };
                let job = match task::job_for(graph, id, &inputs) {
                    Ok(Some(job)) => job,
                    Ok(None) => {
                        idle.push(index);
                        failure = Some(Error::Execution(format!("{} has no worker job", id)));
                        continue;
                    }
                    Err(e) => {
                        idle.push(index);
                        failure = Some(e);
                        continue;
                    }
                };
                debug!(node = id.0, worker = index, "job_dispatch");
                match self.workers[index].send(&WorkerRequest::Run { node: id, job }) {
                    Ok(()) => in_flight += 1,
                    Err(e) => {
                        self.broken = true;
                        failure = Some(Error::worker_failure(
                            graph,
                            id,
                            format!("worker {} unreachable: {}", index, e),
                        ));
                    }
                }
            }

            if in_flight == 0 {
                break;
            }

            let received = match deadline {
                Some(at) => self.replies.recv_deadline(at),
                None => self.replies.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, Ok(WorkerReply::Done { node, block }))) => {
                    in_flight -= 1;
                    idle.push(index);
                    debug!(node = node.0, worker = index, "job_done");
                    if failure.is_none() {
                        frontier.complete(node, Value::Block(block));
                    }
                }
                Ok((index, Ok(WorkerReply::Failed { node, message }))) => {
                    in_flight -= 1;
                    idle.push(index);
                    warn!(node = node.0, worker = index, %message, "job_failed");
                    failure.get_or_insert(Error::worker_failure(graph, node, message));
                }
                Ok((index, Err(message))) => {
                    // The reply stream is gone, so whatever it was running is lost too.
                    warn!(worker = index, %message, "worker_lost");
                    self.kill_all();
                    failure.get_or_insert(Error::WorkerFailure {
                        node: None,
                        task: None,
                        cause: format!("worker {} exited: {}", index, message),
                    });
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.broken = true;
                    failure.get_or_insert(Error::Execution("worker reply channel closed".into()));
                    break;
                }
            }
        }

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

impl Drop for ProcessPool {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            let _ = worker.send(&WorkerRequest::Shutdown);
            worker.stdin = None;
        }
        for worker in &mut self.workers {
            let _ = worker.child.wait();
            if let Some(reader) = worker.reader.take() {
                let _ = reader.join();
            }
        }
        debug!(workers = self.workers.len(), "process_pool_stopped");
    }
}
