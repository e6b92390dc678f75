// Postgres connection source (sqlx)
//
// The sqlx pool is sized to the same max as ResourcePool admission, so a
// granted slot only waits on sqlx while a connection is being opened.
// ResourcePool bounds that wait with the remainder of its own budget.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use super::{Connection, ConnectionSource, StartupError, StoreError};
use crate::config::PoolConfig;

/// Every row of the bounded read as one JSON object, columns as keys
const USERS_QUERY: &str = r#"
    SELECT row_to_json(u)::jsonb
    FROM (SELECT * FROM users LIMIT $1) AS u
"#;

pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    /// Create the sqlx pool and verify the database answers.
    pub async fn connect(config: &PoolConfig) -> Result<Self, StartupError> {
        let max_connections = u32::try_from(config.max_size).map_err(|_| {
            StartupError::InvalidConfig(format!("pool size {} is too large", config.max_size))
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(StartupError::Connect)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(StartupError::Probe)?;

        tracing::info!(
            target_db = %config.redacted_url(),
            max_connections,
            "Connected to database"
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl ConnectionSource for PgSource {
    async fn checkout(&self) -> Result<Box<dyn Connection>, StoreError> {
        let conn = self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => {
                StoreError::Unavailable("timed out opening a database connection".to_string())
            }
            sqlx::Error::PoolClosed => StoreError::Unavailable("pool closed".to_string()),
            other => StoreError::Unavailable(other.to_string()),
        })?;

        Ok(Box::new(PgConnection { conn }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

struct PgConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl Connection for PgConnection {
    async fn fetch_users(&mut self, limit: i64) -> Result<Vec<Value>, StoreError> {
        sqlx::query_scalar::<_, Value>(USERS_QUERY)
            .bind(limit)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}
