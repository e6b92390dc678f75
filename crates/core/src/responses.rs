// Response bodies of the benchmark service
//
// Durations are reported in seconds as floats.

use serde::{Deserialize, Serialize};

/// GET /compute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeResponse {
    pub result: u64,
    /// Time spent in the computation alone, excluding request handling.
    pub duration: f64,
}

/// GET /io
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoResponse {
    /// Rows of the users table, one JSON object per row.
    pub users: Vec<serde_json::Value>,
    /// Time from pool acquisition request to rows fetched.
    pub duration: f64,
}

/// GET /status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub uptime_seconds: f64,
    /// Current wall-clock time, RFC 3339.
    pub time: String,
}

/// Body returned by any endpoint failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: error.into(),
        }
    }
}
