//! Request instrumentation
//!
//! Every request is timed and counted by [`track_metrics`], whatever
//! endpoint handled it and whatever the outcome. Requests that match no route
//! are labelled `handler="none"`. Metrics live in an owned
//! Prometheus registry so several service instances can coexist in one
//! process (tests).

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

use crate::storage::PoolStatus;

/// Path of the scrape endpoint; never instrumented itself
pub const METRICS_PATH: &str = "/metrics";

/// Label used when a request did not match any route
pub const UNMATCHED_HANDLER: &str = "none";

/// Process-wide request metrics
pub struct HttpMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_errors_total: IntCounterVec,
    request_duration: HistogramVec,
    requests_in_progress: IntGaugeVec,
    pool_max: IntGauge,
    pool_in_use: IntGauge,
}

impl HttpMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of handled requests"),
            &["handler", "method", "status"],
        )?;
        let request_errors_total = IntCounterVec::new(
            Opts::new(
                "http_request_errors_total",
                "Requests that completed with a server error",
            ),
            &["handler"],
        )?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Total request handling time, including failures",
            )
            .buckets(prometheus::DEFAULT_BUCKETS.to_vec()),
            &["handler", "method"],
        )?;
        let requests_in_progress = IntGaugeVec::new(
            Opts::new("http_requests_in_progress", "Requests currently being handled"),
            &["handler", "method"],
        )?;
        let pool_max = IntGauge::new("db_pool_connections_max", "Connection pool capacity")?;
        let pool_in_use = IntGauge::new(
            "db_pool_connections_in_use",
            "Connections currently checked out of the pool",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_errors_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(requests_in_progress.clone()))?;
        registry.register(Box::new(pool_max.clone()))?;
        registry.register(Box::new(pool_in_use.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_errors_total,
            request_duration,
            requests_in_progress,
            pool_max,
            pool_in_use,
        })
    }

    /// Open a record for a request that is about to be handled
    pub fn start(&self, handler: &str, method: &str) -> RequestRecord<'_> {
        self.requests_in_progress
            .with_label_values(&[handler, method])
            .inc();

        RequestRecord {
            metrics: self,
            handler: handler.to_string(),
            method: method.to_string(),
            started: Instant::now(),
            finished: false,
        }
    }

    /// Refresh pool gauges (called on scrape)
    pub fn observe_pool(&self, status: PoolStatus) {
        self.pool_max.set(status.max_size as i64);
        self.pool_in_use.set(status.checked_out as i64);
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    pub fn request_count(&self, handler: &str, method: &str, status_class: &str) -> u64 {
        self.requests_total
            .get_metric_with_label_values(&[handler, method, status_class])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    pub fn error_count(&self, handler: &str) -> u64 {
        self.request_errors_total
            .get_metric_with_label_values(&[handler])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    /// Number of durations recorded for a handler
    pub fn duration_samples(&self, handler: &str, method: &str) -> u64 {
        self.request_duration
            .get_metric_with_label_values(&[handler, method])
            .map(|h| h.get_sample_count())
            .unwrap_or(0)
    }

    pub fn in_progress(&self, handler: &str, method: &str) -> i64 {
        self.requests_in_progress
            .get_metric_with_label_values(&[handler, method])
            .map(|g| g.get())
            .unwrap_or(0)
    }
}

/// Per-request measurement, folded into the aggregates by `finish`.
///
/// Dropping an unfinished record (the caller went away mid-request) only
/// releases the in-progress gauge; nothing is counted.
pub struct RequestRecord<'a> {
    metrics: &'a HttpMetrics,
    handler: String,
    method: String,
    started: Instant,
    finished: bool,
}

impl RequestRecord<'_> {
    /// Record duration and outcome. Returns the measured duration.
    pub fn finish(mut self, status: StatusCode) -> Duration {
        let elapsed = self.started.elapsed();
        let labels = [self.handler.as_str(), self.method.as_str()];

        self.metrics
            .request_duration
            .with_label_values(&labels)
            .observe(elapsed.as_secs_f64());
        self.metrics
            .requests_total
            .with_label_values(&[labels[0], labels[1], status_class(status)])
            .inc();
        if status.is_server_error() {
            self.metrics
                .request_errors_total
                .with_label_values(&[labels[0]])
                .inc();
        }

        self.finished = true;
        elapsed
    }
}

impl Drop for RequestRecord<'_> {
    fn drop(&mut self) {
        self.metrics
            .requests_in_progress
            .with_label_values(&[self.handler.as_str(), self.method.as_str()])
            .dec();

        if !self.finished {
            tracing::debug!(
                handler = %self.handler,
                method = %self.method,
                "Request dropped before completion"
            );
        }
    }
}

/// "2xx", "4xx", "5xx", ...
pub fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Middleware timing and counting every request except metric scrapes
pub async fn track_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let handler = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_HANDLER.to_owned());

    if handler == METRICS_PATH {
        return next.run(request).await;
    }

    let method = request.method().as_str().to_owned();
    let record = metrics.start(&handler, &method);

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = record.finish(status);
    tracing::debug!(
        handler = %handler,
        method = %method,
        status = status.as_u16(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Request completed"
    );

    response
}
