// In-memory connection source
//
// Serves a fixed users table from memory with optional per-query latency and
// failure injection. Used by tests to exercise pool admission, release and
// error paths without a database.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::{Connection, ConnectionSource, StoreError};

#[derive(Debug, Clone)]
enum Failure {
    Query(String),
    Unavailable(String),
}

#[derive(Debug, Default)]
struct Counters {
    open: AtomicUsize,
    peak_open: AtomicUsize,
    checkouts: AtomicU64,
    close_calls: AtomicUsize,
    closed: std::sync::atomic::AtomicBool,
    drained: Notify,
}

/// In-memory stand-in for a Postgres pool. Clones share counters.
#[derive(Debug, Clone)]
pub struct MemorySource {
    rows: Arc<Vec<Value>>,
    latency: Duration,
    checkout_latency: Duration,
    failure: Option<Failure>,
    counters: Arc<Counters>,
}

impl MemorySource {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows: Arc::new(rows),
            latency: Duration::ZERO,
            checkout_latency: Duration::ZERO,
            failure: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// A users table with `count` generated rows
    pub fn with_sample_users(count: usize) -> Self {
        let rows = (1..=count)
            .map(|id| {
                json!({
                    "id": id,
                    "name": format!("user-{}", id),
                    "email": format!("user-{}@example.com", id),
                })
            })
            .collect();
        Self::new(rows)
    }

    /// Every query takes at least `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every checkout takes at least `latency` before a connection is handed out
    pub fn with_checkout_latency(mut self, latency: Duration) -> Self {
        self.checkout_latency = latency;
        self
    }

    /// Every query fails with `message`
    pub fn failing_queries(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::Query(message.into()));
        self
    }

    /// Every checkout fails with `message`
    pub fn unavailable(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::Unavailable(message.into()));
        self
    }

    /// Connections currently checked out
    pub fn open_connections(&self) -> usize {
        self.counters.open.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously checked-out connections
    pub fn peak_open_connections(&self) -> usize {
        self.counters.peak_open.load(Ordering::Acquire)
    }

    pub fn checkouts(&self) -> u64 {
        self.counters.checkouts.load(Ordering::Relaxed)
    }

    pub fn close_calls(&self) -> usize {
        self.counters.close_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConnectionSource for MemorySource {
    async fn checkout(&self) -> Result<Box<dyn Connection>, StoreError> {
        if self.counters.closed.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("source closed".to_string()));
        }
        if let Some(Failure::Unavailable(message)) = &self.failure {
            return Err(StoreError::Unavailable(message.clone()));
        }
        if !self.checkout_latency.is_zero() {
            tokio::time::sleep(self.checkout_latency).await;
        }

        let open = self.counters.open.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak_open.fetch_max(open, Ordering::AcqRel);
        self.counters.checkouts.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(MemoryConnection {
            rows: self.rows.clone(),
            latency: self.latency,
            failure: self.failure.clone(),
            counters: self.counters.clone(),
        }))
    }

    async fn close(&self) {
        self.counters.close_calls.fetch_add(1, Ordering::Relaxed);
        self.counters.closed.store(true, Ordering::Release);

        loop {
            let drained = self.counters.drained.notified();
            if self.counters.open.load(Ordering::Acquire) == 0 {
                break;
            }
            drained.await;
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    rows: Arc<Vec<Value>>,
    latency: Duration,
    failure: Option<Failure>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn fetch_users(&mut self, limit: i64) -> Result<Vec<Value>, StoreError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(Failure::Query(message)) = &self.failure {
            return Err(StoreError::Query(message.clone()));
        }

        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.rows.iter().take(limit).cloned().collect())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if self.counters.open.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counters.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_respects_limit() {
        let source = MemorySource::with_sample_users(8);
        let mut conn = source.checkout().await.unwrap();

        let rows = conn.fetch_users(5).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["name"], "user-1");
    }

    #[tokio::test]
    async fn test_counts_open_connections() {
        let source = MemorySource::new(vec![]);
        let a = source.checkout().await.unwrap();
        let b = source.checkout().await.unwrap();
        assert_eq!(source.open_connections(), 2);

        drop(a);
        drop(b);
        assert_eq!(source.open_connections(), 0);
        assert_eq!(source.peak_open_connections(), 2);
        assert_eq!(source.checkouts(), 2);
    }

    #[tokio::test]
    async fn test_close_waits_for_checked_out_connection() {
        let source = MemorySource::new(vec![]);
        let conn = source.checkout().await.unwrap();

        let closer = {
            let source = source.clone();
            tokio::spawn(async move { source.close().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closer.is_finished());

        drop(conn);
        tokio::time::timeout(Duration::from_secs(1), closer)
            .await
            .expect("close should finish once connections are returned")
            .unwrap();

        assert!(source.checkout().await.is_err());
    }
}
