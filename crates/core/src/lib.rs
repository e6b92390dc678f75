// Loadbench shared types
//
// This crate holds what both sides of a benchmark run agree on:
// - Endpoint identifiers and their HTTP paths
// - Response bodies returned by the benchmark service
// - Logging initialization used by every binary
//
// Note: This crate has NO dependency on the HTTP server or the database.

pub mod endpoint;
pub mod responses;

// Telemetry (tracing-subscriber setup)
pub mod telemetry;

pub use endpoint::{Endpoint, ParseEndpointError};
pub use responses::{ComputeResponse, ErrorResponse, IoResponse, StatusResponse};
