// I/O-bound endpoint
//
// Small fixed row count so the duration is dominated by pool wait and
// round-trip latency, not payload size.

use std::time::{Duration, Instant};

use axum::{extract::State, routing::get, Json, Router};
use loadbench_core::IoResponse;
use serde_json::Value;

use super::common::ApiError;
use crate::storage::{ResourcePool, StoreError};
use crate::AppState;

/// Rows fetched per request
pub const USERS_LIMIT: i64 = 5;

pub fn routes(state: AppState) -> Router {
    Router::new().route("/io", get(io)).with_state(state)
}

/// GET /io - bounded read through the connection pool
pub async fn io(State(state): State<AppState>) -> Result<Json<IoResponse>, ApiError> {
    let started = Instant::now();
    let users = fetch_users(&state.pool, state.query_timeout).await?;
    let duration = started.elapsed().as_secs_f64();

    Ok(Json(IoResponse { users, duration }))
}

/// Acquire, query, release. The connection goes back to the pool when it
/// drops at the end of this function, on success and on error alike.
pub async fn fetch_users(
    pool: &ResourcePool,
    query_timeout: Duration,
) -> Result<Vec<Value>, ApiError> {
    let mut conn = pool.acquire().await?;

    let rows = tokio::time::timeout(query_timeout, conn.fetch_users(USERS_LIMIT))
        .await
        .map_err(|_| StoreError::Timeout(query_timeout))??;

    Ok(rows)
}
