// Storage layer
//
// The connection pool is split in two:
// - ResourcePool: admission control (bounded size, bounded wait, scoped release)
// - ConnectionSource: where connections come from (Postgres via sqlx, or in-memory)
//
// Handlers only ever see ResourcePool and PooledConnection.

pub mod memory;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemorySource;
pub use pool::{PoolError, PoolStatus, PooledConnection, ResourcePool, StartupError};
pub use postgres::PgSource;

/// Errors raised by a connection or its source
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The database rejected or failed the query
    #[error("query failed: {0}")]
    Query(String),

    /// The query did not finish within its bound
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// No connection could be established or handed out
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// Source of live database connections.
///
/// Implementations must return a connection to their own pool when the
/// boxed `Connection` is dropped.
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    /// Check out one connection.
    async fn checkout(&self) -> Result<Box<dyn Connection>, StoreError>;

    /// Close every connection. Waits for checked-out connections to come back.
    async fn close(&self);

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// A checked-out database connection
#[async_trait]
pub trait Connection: Send {
    /// Fetch at most `limit` rows of the users table as JSON objects.
    async fn fetch_users(&mut self, limit: i64) -> Result<Vec<Value>, StoreError>;
}
