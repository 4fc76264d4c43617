//! Benchmark harness for the chunked simulation engine: times full-graph
//! executions per scheduler kind and worker count and prints the best of K.

pub mod harness;
pub mod plan;
pub mod report;
pub mod runner;
mod trial;

pub use crate::harness::{BestOf, TimingFacility, TimingSample};
pub use crate::plan::{PlanError, TrialPlan};
pub use crate::report::{print_report, report};
pub use crate::runner::{response_checksum, BenchmarkError, BenchmarkRow, BenchmarkRunner, SuiteOutcome};
pub use crate::trial::{self_serving, time_trial, SERVE_WORKER};
