// Liveness endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use loadbench_core::StatusResponse;

use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new().route("/status", get(status)).with_state(state)
}

/// GET /status - liveness, uptime and current time. Touches no resources.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let uptime = state.clock.uptime().as_secs_f64();

    Json(StatusResponse {
        status: "ok".to_string(),
        uptime_seconds: (uptime * 100.0).round() / 100.0,
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    })
}
