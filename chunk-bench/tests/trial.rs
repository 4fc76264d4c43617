use chunk_bench::time_trial;
use chunk_engine::SchedulerKind;

#[test]
fn test_time_trial_runs_under_both_kinds() {
    let threaded = time_trial(2, SchedulerKind::Threaded, [4, 8, 8], [1, 8, 8], 2).unwrap();
    let multiprocess = time_trial(2, SchedulerKind::Multiprocess, [4, 8, 8], [1, 8, 8], 2).unwrap();

    assert_eq!(threaded.scheduler_kind, SchedulerKind::Threaded);
    assert_eq!(multiprocess.scheduler_kind, SchedulerKind::Multiprocess);
    assert_eq!(multiprocess.worker_count, 2);
    assert_eq!(threaded.repetitions, 3);
    assert_eq!(threaded.checksum, multiprocess.checksum);
}
