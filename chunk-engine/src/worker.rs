//! The child side of the process pool: read requests, run jobs, write replies.

use std::io::{self, Read, Write};

use chunk_types::{Kernel, WorkerReply, WorkerRequest};
use tracing::{debug, info};

use crate::task::run_job;
use crate::Error;

/// Serve requests from `input` until `Shutdown` or end of input.
pub fn serve(input: impl Read, output: impl Write) -> Result<(), Error> {
    let mut input = io::BufReader::new(input);
    let mut output = io::BufWriter::new(output);
    let mut kernel: Option<Kernel> = None;
    let mut served = 0usize;

    loop {
        let request: WorkerRequest = match bincode::deserialize_from(&mut input) {
            Ok(request) => request,
            Err(e) => match *e {
                bincode::ErrorKind::Io(ref io) if io.kind() == io::ErrorKind::UnexpectedEof => break,
                _ => return Err(Error::Execution(format!("malformed request: {}", e))),
            },
        };

        let reply = match request {
            WorkerRequest::Configure(k) => {
                debug!(kernel = ?k, "worker_configured");
                kernel = Some(k);
                continue;
            }
            WorkerRequest::Shutdown => break,
            WorkerRequest::Run { node, job } => {
                served += 1;
                match &kernel {
                    Some(k) => match run_job(job, k) {
                        Ok(block) => WorkerReply::Done { node, block },
                        Err(e) => WorkerReply::Failed {
                            node,
                            message: e.to_string(),
                        },
                    },
                    None => WorkerReply::Failed {
                        node,
                        message: "worker received a job before a kernel".into(),
                    },
                }
            }
        };

        bincode::serialize_into(&mut output, &reply)
            .map_err(|e| Error::Execution(format!("failed to write reply: {}", e)))?;
        output
            .flush()
            .map_err(|e| Error::Execution(format!("failed to flush reply: {}", e)))?;
    }

    info!(served, "worker_exiting");
    Ok(())
}
