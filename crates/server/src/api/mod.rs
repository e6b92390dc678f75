// Benchmark HTTP endpoints
//
// compute, io, status and crash are mounted under the optional API prefix;
// the metrics scrape endpoint is always served at the root.

pub mod common;
pub mod compute;
pub mod crash;
pub mod io;
pub mod metrics;
pub mod status;

pub use common::ApiError;
pub use crash::CrashTrigger;

use axum::Router;

use crate::AppState;

/// Routes of the benchmark endpoint set
pub fn routes(state: AppState) -> Router {
    Router::new()
        .merge(compute::routes())
        .merge(io::routes(state.clone()))
        .merge(status::routes(state.clone()))
        .merge(crash::routes(state))
}
