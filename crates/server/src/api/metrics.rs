// Metrics scrape endpoint

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::METRICS_PATH;
use crate::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(METRICS_PATH, get(scrape))
        .with_state(state)
}

/// GET /metrics - Prometheus text exposition
pub async fn scrape(State(state): State<AppState>) -> Response {
    state.metrics.observe_pool(state.pool.status());

    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
