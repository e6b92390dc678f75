// Connection pool lifecycle and admission control
//
// Invariants:
// - at most `max_size` connections are checked out at any time
// - a checked-out connection is returned when its PooledConnection drops,
//   whatever path the request took (success, error, cancelled future)
// - shutdown runs at most once; acquisition fails after it

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{Connection, ConnectionSource, PgSource, StoreError};
use crate::config::PoolConfig;

/// Pool acquisition errors
#[derive(Debug, Error)]
pub enum PoolError {
    /// No slot freed up within the wait limit
    #[error("no database connection available after {waited:?} (pool size {max_size})")]
    Exhausted { waited: Duration, max_size: usize },

    /// The pool has been shut down
    #[error("connection pool is shut down")]
    Closed,

    /// A slot was granted but the source could not provide a connection
    #[error(transparent)]
    Source(#[from] StoreError),
}

/// Fatal errors while establishing the pool at process start
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("database did not answer the startup probe: {0}")]
    Probe(#[source] sqlx::Error),
}

/// Point-in-time view of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub checked_out: usize,
    pub available: usize,
}

/// Bounded pool of database connections shared by all requests
pub struct ResourcePool {
    source: Arc<dyn ConnectionSource>,
    permits: Arc<Semaphore>,
    max_size: usize,
    acquire_timeout: Duration,
    closed: AtomicBool,
}

impl ResourcePool {
    /// Create a pool over an existing connection source
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        max_size: usize,
        acquire_timeout: Duration,
    ) -> Result<Self, StartupError> {
        if max_size == 0 {
            return Err(StartupError::InvalidConfig(
                "max_size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            source,
            permits: Arc::new(Semaphore::new(max_size)),
            max_size,
            acquire_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Connect to Postgres and build the pool.
    ///
    /// Fails if the database cannot be reached: the service must not start
    /// serving with a broken pool.
    pub async fn connect(config: &PoolConfig) -> Result<Self, StartupError> {
        let source = PgSource::connect(config).await?;
        Self::new(Arc::new(source), config.max_size, config.acquire_timeout)
    }

    /// Wait for a free slot, then check out a connection.
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let started = Instant::now();

        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            self.permits.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(PoolError::Closed),
            Err(_) => {
                let waited = started.elapsed();
                tracing::warn!(
                    waited_ms = waited.as_millis() as u64,
                    max_size = self.max_size,
                    "Connection pool exhausted"
                );
                return Err(PoolError::Exhausted {
                    waited,
                    max_size: self.max_size,
                });
            }
        };

        // The source gets whatever is left of the same wait budget.
        // On error or timeout the permit drops here and the slot is released.
        let remaining = self.acquire_timeout.saturating_sub(started.elapsed());
        let conn = match tokio::time::timeout(remaining, self.source.checkout()).await {
            Ok(conn) => conn?,
            Err(_) => {
                let waited = started.elapsed();
                tracing::warn!(
                    waited_ms = waited.as_millis() as u64,
                    backend = self.source.name(),
                    "Timed out opening a connection"
                );
                return Err(PoolError::Exhausted {
                    waited,
                    max_size: self.max_size,
                });
            }
        };

        tracing::trace!(
            wait_us = started.elapsed().as_micros() as u64,
            available = self.permits.available_permits(),
            "Connection acquired"
        );

        Ok(PooledConnection {
            conn,
            _permit: permit,
        })
    }

    /// Close the pool. Only the graceful shutdown path calls this.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::warn!("Connection pool already shut down");
            return;
        }

        self.permits.close();
        tracing::info!(backend = self.source.name(), "Draining connection pool");
        self.source.close().await;
        tracing::info!("Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        let available = self.permits.available_permits().min(self.max_size);
        PoolStatus {
            max_size: self.max_size,
            checked_out: self.max_size - available,
            available,
        }
    }
}

impl std::fmt::Debug for ResourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("backend", &self.source.name())
            .field("status", &self.status())
            .field("acquire_timeout", &self.acquire_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection borrowed from the pool for the duration of one request.
///
/// Field order matters: the connection goes back to its source before the
/// admission slot is released.
pub struct PooledConnection {
    conn: Box<dyn Connection>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub async fn fetch_users(&mut self, limit: i64) -> Result<Vec<Value>, StoreError> {
        self.conn.fetch_users(limit).await
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}
