//! Request statistics for a load run
//!
//! Per-endpoint request counts, failure counts by kind, and latency
//! distributions. Everything lives in memory for the duration of one run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use loadbench_core::Endpoint;
use parking_lot::Mutex;

use crate::client::{FailureKind, RequestFailure};

/// Highest latency tracked at full precision; slower requests land in the top bucket
const MAX_TRACKED_MICROS: u64 = 3_600_000_000;

/// Latency distribution with exact min/max/mean and bucketed percentiles.
///
/// Memory stays fixed however long the run lasts.
#[derive(Debug)]
pub struct LatencyHistogram {
    /// Microsecond buckets at 3 significant figures (for percentiles)
    buckets: Mutex<Histogram<u64>>,
    sum_micros: AtomicU64,
    count: AtomicU64,
    min_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(
                Histogram::new_with_bounds(1, MAX_TRACKED_MICROS, 3)
                    .expect("histogram bounds are constant"),
            ),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
            min_micros: AtomicU64::new(u64::MAX),
            max_micros: AtomicU64::new(0),
        }
    }

    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;

        // Lowest trackable value is 1us
        self.buckets.lock().saturating_record(micros.max(1));
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.min_micros.fetch_min(micros, Ordering::Relaxed);
        self.max_micros.fetch_max(micros, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> Duration {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        let sum = self.sum_micros.load(Ordering::Relaxed);
        Duration::from_micros(sum / count)
    }

    pub fn min(&self) -> Duration {
        let min = self.min_micros.load(Ordering::Relaxed);
        if min == u64::MAX {
            Duration::ZERO
        } else {
            Duration::from_micros(min)
        }
    }

    pub fn max(&self) -> Duration {
        Duration::from_micros(self.max_micros.load(Ordering::Relaxed))
    }

    /// Percentile (0.0 to 1.0)
    pub fn percentile(&self, p: f64) -> Duration {
        quantile_of(&self.buckets.lock(), p)
    }

    pub fn summary(&self) -> LatencySummary {
        let buckets = self.buckets.lock();
        LatencySummary {
            count: self.count(),
            mean: self.mean(),
            min: self.min(),
            max: self.max(),
            p50: quantile_of(&buckets, 0.50),
            p95: quantile_of(&buckets, 0.95),
            p99: quantile_of(&buckets, 0.99),
        }
    }
}

fn quantile_of(buckets: &Histogram<u64>, q: f64) -> Duration {
    if buckets.is_empty() {
        return Duration::ZERO;
    }
    Duration::from_micros(buckets.value_at_quantile(q))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl LatencySummary {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "count": self.count,
            "mean_ms": millis(self.mean),
            "min_ms": millis(self.min),
            "max_ms": millis(self.max),
            "p50_ms": millis(self.p50),
            "p95_ms": millis(self.p95),
            "p99_ms": millis(self.p99),
        })
    }
}

pub(crate) fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Counters for one endpoint
#[derive(Debug, Default)]
pub struct EndpointStats {
    /// Latency of successful requests
    latency: LatencyHistogram,
    failures: [AtomicU64; 5],
}

impl EndpointStats {
    pub fn successes(&self) -> u64 {
        self.latency.count()
    }

    pub fn failures(&self, kind: FailureKind) -> u64 {
        self.failures[kind.index()].load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn requests(&self) -> u64 {
        self.successes() + self.total_failures()
    }
}

/// Shared statistics of a load run
#[derive(Debug)]
pub struct LoadStats {
    started: Instant,
    endpoints: HashMap<Endpoint, EndpointStats>,
    active_users: AtomicUsize,
}

impl Default for LoadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            endpoints: Endpoint::ALL
                .into_iter()
                .map(|e| (e, EndpointStats::default()))
                .collect(),
            active_users: AtomicUsize::new(0),
        }
    }

    pub fn record_success(&self, endpoint: Endpoint, elapsed: Duration) {
        self.endpoint(endpoint).latency.record(elapsed);
    }

    pub fn record_failure(&self, endpoint: Endpoint, failure: &RequestFailure) {
        self.endpoint(endpoint).failures[failure.kind().index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> &EndpointStats {
        // Every endpoint is inserted in new()
        &self.endpoints[&endpoint]
    }

    pub fn user_started(&self) {
        self.active_users.fetch_add(1, Ordering::Relaxed);
    }

    pub fn user_stopped(&self) {
        self.active_users.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_users(&self) -> usize {
        self.active_users.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn total_requests(&self) -> u64 {
        self.endpoints.values().map(EndpointStats::requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.endpoints.values().map(EndpointStats::total_failures).sum()
    }

    /// Point-in-time copy; endpoints never requested are left out
    pub fn snapshot(&self) -> StatsSnapshot {
        let rows = Endpoint::ALL
            .into_iter()
            .filter_map(|endpoint| {
                let stats = self.endpoint(endpoint);
                if stats.requests() == 0 {
                    return None;
                }
                Some(EndpointSnapshot {
                    endpoint,
                    requests: stats.requests(),
                    failures: FailureKind::ALL
                        .into_iter()
                        .map(|kind| (kind, stats.failures(kind)))
                        .filter(|(_, count)| *count > 0)
                        .collect(),
                    latency: stats.latency.summary(),
                })
            })
            .collect();

        StatsSnapshot {
            elapsed: self.elapsed(),
            rows,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointSnapshot {
    pub endpoint: Endpoint,
    pub requests: u64,
    /// Non-zero failure counts, in `FailureKind::ALL` order
    pub failures: Vec<(FailureKind, u64)>,
    pub latency: LatencySummary,
}

impl EndpointSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.failures.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub rows: Vec<EndpointSnapshot>,
}

impl StatsSnapshot {
    pub fn total_requests(&self) -> u64 {
        self.rows.iter().map(|r| r.requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.rows.iter().map(EndpointSnapshot::total_failures).sum()
    }

    /// Requests per second over the whole run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total_requests() as f64 / secs
    }

    pub fn to_json(&self) -> serde_json::Value {
        let endpoints: Vec<_> = self
            .rows
            .iter()
            .map(|row| {
                let failures: serde_json::Map<String, serde_json::Value> = row
                    .failures
                    .iter()
                    .map(|(kind, n)| (kind.as_str().to_string(), (*n).into()))
                    .collect();
                serde_json::json!({
                    "endpoint": row.endpoint,
                    "requests": row.requests,
                    "failures": failures,
                    "latency": row.latency.to_json(),
                })
            })
            .collect();

        serde_json::json!({
            "duration_secs": self.elapsed.as_secs_f64(),
            "total_requests": self.total_requests(),
            "total_failures": self.total_failures(),
            "throughput": self.throughput(),
            "endpoints": endpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_histogram() {
        let hist = LatencyHistogram::new();

        for i in 1..=100 {
            hist.record(Duration::from_micros(i));
        }

        assert_eq!(hist.count(), 100);
        assert_eq!(hist.min(), Duration::from_micros(1));
        assert_eq!(hist.max(), Duration::from_micros(100));
        assert_eq!(hist.mean(), Duration::from_micros(50));

        let p50 = hist.percentile(0.50);
        assert!(p50 >= Duration::from_micros(49) && p50 <= Duration::from_micros(51));
        assert_eq!(hist.percentile(1.0), Duration::from_micros(100));
    }

    #[test]
    fn test_histogram_memory_does_not_grow_with_samples() {
        let hist = LatencyHistogram::new();
        let before = hist.buckets.lock().distinct_values();

        for i in 0..200_000u64 {
            hist.record(Duration::from_micros(1 + i % 50_000));
        }
        // Beyond the tracked range: clamped, still counted
        hist.record(Duration::from_secs(7_200));

        assert_eq!(hist.buckets.lock().distinct_values(), before);
        assert_eq!(hist.count(), 200_001);
        assert_eq!(hist.max(), Duration::from_secs(7_200));

        let p50 = hist.percentile(0.50);
        assert!(
            p50 >= Duration::from_micros(24_900) && p50 <= Duration::from_micros(25_100),
            "p50 = {:?}",
            p50
        );
    }

    #[test]
    fn test_zero_latency_is_recorded() {
        let hist = LatencyHistogram::new();
        hist.record(Duration::ZERO);
        assert_eq!(hist.count(), 1);
        assert_eq!(hist.min(), Duration::ZERO);
        assert_eq!(hist.summary().p99, Duration::from_micros(1));
    }

    #[test]
    fn test_empty_histogram_is_zero() {
        let summary = LatencyHistogram::new().summary();
        assert_eq!(summary, LatencySummary::default());
    }

    #[test]
    fn test_failures_counted_by_kind() {
        let stats = LoadStats::new();

        stats.record_success(Endpoint::Io, Duration::from_millis(12));
        stats.record_failure(
            Endpoint::Io,
            &RequestFailure::Status {
                code: 503,
                body: String::new(),
            },
        );
        stats.record_failure(Endpoint::Io, &RequestFailure::Timeout);
        stats.record_failure(Endpoint::Crash, &RequestFailure::ConnectionReset);

        let io = stats.endpoint(Endpoint::Io);
        assert_eq!(io.requests(), 3);
        assert_eq!(io.successes(), 1);
        assert_eq!(io.failures(FailureKind::Status), 1);
        assert_eq!(io.failures(FailureKind::Timeout), 1);
        assert_eq!(stats.total_requests(), 4);
        assert_eq!(stats.total_failures(), 3);
    }

    #[test]
    fn test_snapshot_skips_idle_endpoints() {
        let stats = LoadStats::new();
        stats.record_success(Endpoint::Status, Duration::from_millis(2));
        stats.record_failure(Endpoint::Compute, &RequestFailure::ConnectionRefused);

        let snapshot = stats.snapshot();
        let endpoints: Vec<_> = snapshot.rows.iter().map(|r| r.endpoint).collect();
        assert_eq!(endpoints, vec![Endpoint::Compute, Endpoint::Status]);
        assert_eq!(
            snapshot.rows[0].failures,
            vec![(FailureKind::ConnectionRefused, 1)]
        );
        assert_eq!(snapshot.total_requests(), 2);
        assert_eq!(snapshot.total_failures(), 1);

        let json = snapshot.to_json();
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["endpoints"][0]["failures"]["connection_refused"], 1);
        assert_eq!(json["endpoints"][1]["endpoint"], "status");
    }

    #[test]
    fn test_active_users() {
        let stats = LoadStats::new();
        stats.user_started();
        stats.user_started();
        stats.user_stopped();
        assert_eq!(stats.active_users(), 1);
    }
}
