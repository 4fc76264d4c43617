use std::io::Write;
use std::time::Duration;

use chunk_bench::{PlanError, TrialPlan};
use chunk_engine::{Kernel, SchedulerKind};

#[test]
fn test_defaults() {
    let plan = TrialPlan::default();
    assert_eq!(plan.backends, SchedulerKind::ALL.to_vec());
    assert_eq!(plan.workers, vec![1, 2, 4, 8]);
    assert_eq!(plan.rounds.get(), 3);
    assert_eq!(plan.params().seed, 99);
    assert!(plan.exec_config().timeout.is_none());
}

#[test]
fn test_loads_partial_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "shape": [8, 20, 20], "chunk": [1, 20, 20], "steps": 5,
             "backends": ["threaded"], "workers": [1, 2, 4],
             "physics": {{ "delta_t": 0.001 }}, "timeout_ms": 2500 }}"#
    )
    .unwrap();

    let plan = TrialPlan::from_json_file(file.path()).unwrap();

    let params = plan.params();
    assert_eq!(params.shape.0, [8, 20, 20]);
    assert_eq!(params.chunk.0, [1, 20, 20]);
    assert_eq!(params.n_steps, 5);
    assert_eq!(plan.backends, vec![SchedulerKind::Threaded]);
    assert_eq!(plan.workers, vec![1, 2, 4]);
    assert_eq!(plan.rounds.get(), 3);
    match plan.kernel() {
        Kernel::CahnHilliard(ch) => {
            assert_eq!(ch.delta_t, 0.001);
            assert_eq!(ch.spacing, 1.0);
        }
        other => panic!("unexpected kernel {:?}", other),
    }
    assert_eq!(plan.exec_config().timeout, Some(Duration::from_millis(2500)));
}

#[test]
fn test_rejects_bad_json() {
    assert!(matches!(TrialPlan::from_json_str(r#"{ "rounds": 0 }"#), Err(PlanError::Json(_))));
    assert!(matches!(TrialPlan::from_json_str(r#"{ "stepz": 3 }"#), Err(PlanError::Json(_))));
    assert!(matches!(
        TrialPlan::from_json_str(r#"{ "backends": ["gpu"] }"#),
        Err(PlanError::Json(_))
    ));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TrialPlan::from_json_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, PlanError::Read { .. }));
}

#[test]
fn test_flags_override_fields() {
    let mut plan = TrialPlan::default();
    plan.apply_flag("--shape", "8x20x20").unwrap();
    plan.apply_flag("--chunk", "1,20,20").unwrap();
    plan.apply_flag("--steps", "5").unwrap();
    plan.apply_flag("--workers", "4,2,1").unwrap();
    plan.apply_flag("--backend", "multiprocess").unwrap();
    plan.apply_flag("--rounds", "7").unwrap();
    plan.apply_flag("--seed", "3").unwrap();
    plan.apply_flag("--timeout-ms", "100").unwrap();

    assert_eq!(plan.shape, [8, 20, 20]);
    assert_eq!(plan.chunk, [1, 20, 20]);
    assert_eq!(plan.steps, 5);
    assert_eq!(plan.workers, vec![4, 2, 1]);
    assert_eq!(plan.backends, vec![SchedulerKind::Multiprocess]);
    assert_eq!(plan.rounds.get(), 7);
    assert_eq!(plan.params().seed, 3);
    assert_eq!(plan.timeout_ms, Some(100));

    plan.apply_flag("--backend", "all").unwrap();
    assert_eq!(plan.backends, SchedulerKind::ALL.to_vec());
}

#[test]
fn test_bad_flags() {
    let mut plan = TrialPlan::default();
    assert!(matches!(plan.apply_flag("--rounds", "0"), Err(PlanError::InvalidValue { .. })));
    assert!(matches!(plan.apply_flag("--shape", "8,20"), Err(PlanError::InvalidValue { .. })));
    assert!(matches!(plan.apply_flag("--backend", "gpu"), Err(PlanError::InvalidValue { .. })));
    assert!(matches!(plan.apply_flag("--bench", "x"), Err(PlanError::UnknownFlag(_))));
    assert_eq!(plan, TrialPlan::default());
}
