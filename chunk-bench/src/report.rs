use std::fmt::Write;

use chunk_engine::SchedulerKind;

use crate::harness::format_duration;
use crate::runner::BenchmarkRow;

/// Render rows as a table, one block per scheduler kind in order of first
/// appearance, each block ordered by descending worker count. The Check column
/// compares each row's checksum against the first row given.
pub fn report(rows: &[BenchmarkRow]) -> String {
    let kind_w = 14;
    let col_w = 10;

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<kind_w$} {:>col_w$} {:>col_w$} {:>6} {:>6}",
        "Scheduler", "Workers", "Best", "Reps", "Check",
        kind_w = kind_w, col_w = col_w
    );
    let _ = writeln!(out, "{}", "-".repeat(kind_w + col_w * 2 + 6 + 6 + 4));

    let reference = rows.first().map(|r| r.checksum);

    let mut kinds: Vec<SchedulerKind> = Vec::new();
    for row in rows {
        if !kinds.contains(&row.scheduler_kind) {
            kinds.push(row.scheduler_kind);
        }
    }

    for kind in kinds {
        let mut group: Vec<&BenchmarkRow> = rows.iter().filter(|r| r.scheduler_kind == kind).collect();
        // sort_by is stable, so duplicate worker counts keep their run order.
        group.sort_by(|a, b| b.worker_count.cmp(&a.worker_count));

        for r in group {
            let check = if Some(r.checksum) == reference { "✓" } else { "✗" };
            let _ = writeln!(
                out,
                "{:<kind_w$} {:>col_w$} {:>col_w$} {:>6} {:>6}",
                r.scheduler_kind.as_str(),
                r.worker_count,
                format_duration(r.best),
                r.repetitions,
                check,
                kind_w = kind_w, col_w = col_w
            );
        }
    }
    out
}

/// Print [`report`] to stdout.
pub fn print_report(rows: &[BenchmarkRow]) {
    println!("{}", report(rows));
}
