// CPU-bound endpoint
//
// Naive exponential recursion on purpose: the point is a reproducible CPU
// cost per request. Do not memoize.

use std::hint::black_box;
use std::time::Instant;

use axum::{routing::get, Json, Router};
use loadbench_core::ComputeResponse;

/// Fibonacci index computed per request
pub const FIB_INPUT: u32 = 30;

pub fn routes() -> Router {
    Router::new().route("/compute", get(compute))
}

/// GET /compute - burn CPU, report the result and the computation time
pub async fn compute() -> Json<ComputeResponse> {
    let started = Instant::now();
    let result = fibonacci(black_box(FIB_INPUT));
    let duration = started.elapsed().as_secs_f64();

    tracing::trace!(result, duration, "Computed fibonacci");

    Json(ComputeResponse { result, duration })
}

pub fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return n as u64;
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}
