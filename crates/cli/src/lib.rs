// Loadbench load generator
//
// Simulated users pick a weighted task, call the benchmark service, then think
// for a random interval. Stats are kept in memory and reported at the end.

pub mod client;
pub mod output;
pub mod probe;
pub mod runner;
pub mod stats;
pub mod task;
pub mod user;

pub use client::{CallOutcome, Client, FailureKind, RequestFailure};
pub use output::OutputFormat;
pub use probe::{run_probe, ProbeResult};
pub use runner::{LoadConfig, LoadRunner};
pub use stats::{LoadStats, StatsSnapshot};
pub use task::{LoadError, LoadTask, TaskSet, ThinkTime, DEFAULT_TASKS};
pub use user::SimulatedUser;
