use std::io::Cursor;

use chunk_engine::worker::serve;
use chunk_engine::{run_job, Halo, Job, Kernel, NodeId, VolumeShape};
use chunk_types::{WorkerReply, WorkerRequest};
use ndarray::Array3;

fn encode(requests: &[WorkerRequest]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for request in requests {
        bincode::serialize_into(&mut bytes, request).unwrap();
    }
    bytes
}

fn decode(bytes: &[u8]) -> Vec<WorkerReply> {
    let mut cursor = Cursor::new(bytes);
    let mut replies = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        replies.push(bincode::deserialize_from(&mut cursor).unwrap());
    }
    replies
}

fn init_job() -> Job {
    Job::Init {
        origin: [0, 0, 0],
        extent: [2, 3, 4],
        shape: VolumeShape([2, 3, 4]),
        seed: 99,
    }
}

#[test]
fn test_worker_runs_jobs_in_order() {
    let input = encode(&[
        WorkerRequest::Configure(Kernel::default()),
        WorkerRequest::Run { node: NodeId(4), job: init_job() },
        WorkerRequest::Run { node: NodeId(5), job: init_job() },
        WorkerRequest::Shutdown,
    ]);
    let mut output = Vec::new();

    serve(Cursor::new(input), &mut output).unwrap();

    let replies = decode(&output);
    let expected = run_job(init_job(), &Kernel::default()).unwrap();
    assert_eq!(
        replies,
        vec![
            WorkerReply::Done { node: NodeId(4), block: expected.clone() },
            WorkerReply::Done { node: NodeId(5), block: expected },
        ]
    );
}

#[test]
fn test_worker_rejects_jobs_before_configure() {
    let input = encode(&[WorkerRequest::Run { node: NodeId(0), job: init_job() }]);
    let mut output = Vec::new();

    // End of input without Shutdown is a clean exit too.
    serve(Cursor::new(input), &mut output).unwrap();

    match decode(&output).as_slice() {
        [WorkerReply::Failed { node, .. }] => assert_eq!(*node, NodeId(0)),
        other => panic!("unexpected replies {:?}", other),
    }
}

#[test]
fn test_worker_reports_malformed_input() {
    let mut output = Vec::new();
    let result = serve(Cursor::new(vec![0xFFu8; 16]), &mut output);
    assert!(result.is_err());
}

#[test]
fn test_step_job_takes_state_from_halo_interior() {
    let job = Job::Step {
        step: 1,
        origin: [2, 0, 4],
        halo: Halo {
            width: 2,
            data: Array3::from_elem((6, 7, 8), 0.25),
        },
    };

    let block = run_job(job, &Kernel::default()).unwrap();

    assert_eq!(block.origin, [2, 0, 4]);
    assert_eq!(block.extent(), [2, 3, 4]);
    assert!(block.data.iter().all(|v| (v - 0.25).abs() < 1e-12));
}

#[test]
fn test_step_job_without_interior_fails() {
    let job = Job::Step {
        step: 1,
        origin: [0, 0, 0],
        halo: Halo {
            width: 2,
            data: Array3::zeros((4, 6, 6)),
        },
    };
    assert!(run_job(job, &Kernel::default()).is_err());
}
