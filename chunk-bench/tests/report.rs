use std::time::Duration;

use chunk_bench::{report, BenchmarkRow};
use chunk_engine::SchedulerKind;

fn row(kind: SchedulerKind, workers: usize, ms: u64, checksum: u64) -> BenchmarkRow {
    BenchmarkRow {
        worker_count: workers,
        scheduler_kind: kind,
        best: Duration::from_millis(ms),
        repetitions: 3,
        checksum,
    }
}

/// (scheduler, workers, check) for every data line of the table.
fn table(text: &str) -> Vec<(String, usize, String)> {
    text.lines()
        .filter(|l| l.starts_with("threaded") || l.starts_with("multiprocess"))
        .map(|l| {
            let cols: Vec<&str> = l.split_whitespace().collect();
            (cols[0].to_string(), cols[1].parse().unwrap(), cols[4].to_string())
        })
        .collect()
}

#[test]
fn test_groups_by_kind_and_orders_by_descending_workers() {
    let rows = vec![
        row(SchedulerKind::Threaded, 1, 40, 7),
        row(SchedulerKind::Multiprocess, 2, 30, 7),
        row(SchedulerKind::Threaded, 4, 12, 7),
        row(SchedulerKind::Threaded, 2, 21, 7),
        row(SchedulerKind::Multiprocess, 1, 55, 7),
    ];

    let lines = table(&report(&rows));
    let order: Vec<(&str, usize)> = lines.iter().map(|(k, w, _)| (k.as_str(), *w)).collect();

    assert_eq!(
        order,
        vec![
            ("threaded", 4),
            ("threaded", 2),
            ("threaded", 1),
            ("multiprocess", 2),
            ("multiprocess", 1),
        ]
    );
}

#[test]
fn test_first_seen_kind_comes_first() {
    let rows = vec![
        row(SchedulerKind::Multiprocess, 1, 10, 1),
        row(SchedulerKind::Threaded, 1, 10, 1),
    ];

    let lines = table(&report(&rows));
    assert_eq!(lines[0].0, "multiprocess");
    assert_eq!(lines[1].0, "threaded");
}

#[test]
fn test_check_column_flags_mismatched_results() {
    let rows = vec![
        row(SchedulerKind::Threaded, 2, 10, 11),
        row(SchedulerKind::Threaded, 1, 20, 12),
    ];

    let lines = table(&report(&rows));
    assert_eq!(lines[0].2, "✓");
    assert_eq!(lines[1].2, "✗");
}

#[test]
fn test_report_does_not_touch_rows() {
    let rows = vec![
        row(SchedulerKind::Threaded, 1, 40, 7),
        row(SchedulerKind::Threaded, 8, 9, 7),
    ];
    let before = rows.clone();

    let text = report(&rows);

    assert_eq!(rows, before);
    assert!(text.contains("40.00ms"));
    assert!(text.contains("9.00ms"));
    assert!(report(&[]).contains("Scheduler"));
}
