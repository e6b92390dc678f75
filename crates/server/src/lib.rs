// Loadbench benchmark service
//
// Process-wide resources (connection pool, start clock, metrics registry,
// crash trigger) are created once in main and injected into handlers through
// AppState, so tests can run several isolated instances side by side.

pub mod api;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use api::CrashTrigger;
pub use clock::ProcessClock;
pub use config::{ConfigError, PoolConfig, ServerConfig};
pub use metrics::HttpMetrics;
pub use storage::{PoolError, ResourcePool, StartupError};

/// App state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ResourcePool>,
    pub clock: ProcessClock,
    pub metrics: Arc<HttpMetrics>,
    pub crash: CrashTrigger,
    /// Upper bound on the io endpoint's query
    pub query_timeout: Duration,
}

impl AppState {
    pub fn new(
        pool: Arc<ResourcePool>,
        clock: ProcessClock,
        metrics: Arc<HttpMetrics>,
        crash: CrashTrigger,
        query_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            clock,
            metrics,
            crash,
            query_timeout,
        }
    }
}

/// Assemble the full application router.
///
/// Layer order, outermost first: trace, CORS, metrics, panic catcher, handler.
/// Panics therefore surface as counted 500 responses. The metrics layer also
/// wraps the 404 fallback, so unmatched requests are counted too.
pub fn build_app(state: AppState, api_prefix: &str, cors_origins: &[String]) -> Router {
    let metrics = state.metrics.clone();

    let app = build_router_with_prefix(api::routes(state.clone()), api_prefix)
        .merge(api::metrics::routes(state))
        .route_layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(
            metrics,
            metrics::track_metrics,
        ));

    let app = match cors_layer(cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

/// CORS layer for the configured origins; None when no origin is configured
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let methods = [Method::GET, Method::OPTIONS];

    if origins.iter().any(|o| o == "*") {
        return Some(
            CorsLayer::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods(methods)
                .allow_headers(Any),
        );
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(methods)
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::ORIGIN,
                header::CACHE_CONTROL,
            ])
            .allow_credentials(true),
    )
}
