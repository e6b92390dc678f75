// Benchmark endpoint identifiers
//
// The endpoint set is fixed: every endpoint has a distinct resource profile
// (CPU, pooled I/O, none, process termination).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the benchmark service endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// CPU-bound: naive recursive Fibonacci.
    Compute,
    /// I/O-bound: bounded read through the connection pool.
    Io,
    /// Liveness and uptime.
    Status,
    /// Terminates the serving process without cleanup.
    Crash,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Compute,
        Endpoint::Io,
        Endpoint::Status,
        Endpoint::Crash,
    ];

    /// Endpoints exercised by a default load run. Crash is opt-in only.
    pub const LOAD_DEFAULT: [Endpoint; 3] = [Endpoint::Compute, Endpoint::Io, Endpoint::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Compute => "compute",
            Endpoint::Io => "io",
            Endpoint::Status => "status",
            Endpoint::Crash => "crash",
        }
    }

    /// Route path relative to the API prefix.
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Compute => "/compute",
            Endpoint::Io => "/io",
            Endpoint::Status => "/status",
            Endpoint::Crash => "/crash",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown endpoint '{0}' (expected one of: compute, io, status, crash)")]
pub struct ParseEndpointError(pub String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('/');
        Endpoint::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| ParseEndpointError(s.to_string()))
    }
}
