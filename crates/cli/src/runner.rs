//! Load run orchestration
//!
//! Spawns simulated users at a fixed rate, logs progress periodically, and
//! stops every user on cancellation (Ctrl-C or the run time limit).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::stats::{LoadStats, StatsSnapshot};
use crate::task::{LoadError, TaskSet, ThinkTime};
use crate::user::SimulatedUser;

/// Configuration of a load run
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Service root, including any API prefix
    pub host: String,
    pub users: usize,
    /// Users started per second
    pub spawn_rate: f64,
    pub think: ThinkTime,
    /// Stop after this long; None runs until cancelled
    pub run_time: Option<Duration>,
    pub request_timeout: Duration,
    pub tasks: TaskSet,
    pub report_interval: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8000".to_string(),
            users: 10,
            spawn_rate: 1.0,
            think: ThinkTime::default(),
            run_time: None,
            request_timeout: Duration::from_secs(30),
            tasks: TaskSet::default(),
            report_interval: Duration::from_secs(5),
        }
    }
}

impl LoadConfig {
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.users == 0 {
            return Err(LoadError::ZeroUsers);
        }
        self.spawn_interval()?;
        if self.report_interval.is_zero() {
            return Err(LoadError::ZeroReportInterval);
        }
        Ok(())
    }

    /// Pause between user starts; rates too small to express as a Duration are rejected
    fn spawn_interval(&self) -> Result<Duration, LoadError> {
        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            return Err(LoadError::InvalidSpawnRate(self.spawn_rate));
        }
        Duration::try_from_secs_f64(1.0 / self.spawn_rate)
            .map_err(|_| LoadError::InvalidSpawnRate(self.spawn_rate))
    }
}

/// Drives one load run
pub struct LoadRunner {
    config: LoadConfig,
    spawn_interval: Duration,
    client: Arc<Client>,
    stats: Arc<LoadStats>,
    cancel: CancellationToken,
}

impl LoadRunner {
    pub fn new(config: LoadConfig) -> Result<Self, LoadError> {
        config.validate()?;
        let spawn_interval = config.spawn_interval()?;
        let client = Client::new(&config.host, config.request_timeout)?;

        Ok(Self {
            config,
            spawn_interval,
            client: Arc::new(client),
            stats: Arc::new(LoadStats::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Cancelling this token stops the run
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> Arc<LoadStats> {
        self.stats.clone()
    }

    /// Run until cancelled or the run time elapses, then return final stats
    pub async fn run(self) -> StatsSnapshot {
        let config = &self.config;
        tracing::info!(
            host = %config.host,
            users = config.users,
            spawn_rate = config.spawn_rate,
            min_wait_secs = config.think.min().as_secs_f64(),
            max_wait_secs = config.think.max().as_secs_f64(),
            run_time_secs = config.run_time.map(|d| d.as_secs_f64()),
            "Starting load run"
        );

        if let Some(run_time) = config.run_time {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(run_time) => {
                        tracing::info!("Run time reached, stopping users");
                        cancel.cancel();
                    }
                }
            });
        }

        let reporter = tokio::spawn(report_progress(
            self.stats.clone(),
            config.report_interval,
            self.cancel.clone(),
        ));

        let tasks = Arc::new(config.tasks.clone());
        let mut users = JoinSet::new();
        let spawn_interval = self.spawn_interval;

        for id in 0..config.users {
            if self.cancel.is_cancelled() {
                break;
            }

            let user = SimulatedUser::new(
                id,
                self.client.clone(),
                tasks.clone(),
                config.think,
                self.stats.clone(),
            );
            users.spawn(user.run(self.cancel.clone()));

            if id + 1 < config.users {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(spawn_interval) => {}
                }
            }
        }
        tracing::info!(spawned = users.len(), "All users spawned");

        self.cancel.cancelled().await;

        while let Some(result) = users.join_next().await {
            if let Err(e) = result {
                tracing::warn!("User task failed: {}", e);
            }
        }
        if let Err(e) = reporter.await {
            tracing::warn!("Progress reporter failed: {}", e);
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            requests = snapshot.total_requests(),
            failures = snapshot.total_failures(),
            duration_secs = snapshot.elapsed.as_secs_f64(),
            "Load run finished"
        );
        snapshot
    }
}

async fn report_progress(stats: Arc<LoadStats>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let elapsed = stats.elapsed().as_secs_f64();
        let requests = stats.total_requests();
        tracing::info!(
            users = stats.active_users(),
            requests,
            failures = stats.total_failures(),
            rps = if elapsed > 0.0 { requests as f64 / elapsed } else { 0.0 },
            "Progress"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use loadbench_core::Endpoint;
    use tokio::net::TcpListener;

    async fn serve() -> String {
        let router = Router::new()
            .route("/compute", get(|| async { r#"{"result":832040}"# }))
            .route("/io", get(|| async { r#"{"users":[]}"# }))
            .route("/status", get(|| async { r#"{"status":"ok"}"# }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let config = LoadConfig {
            users: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LoadError::ZeroUsers)));

        let config = LoadConfig {
            spawn_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadError::InvalidSpawnRate(_))
        ));

        assert!(LoadConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unrepresentable_intervals() {
        let config = LoadConfig {
            spawn_rate: 1e-300,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadError::InvalidSpawnRate(_))
        ));
        assert!(LoadRunner::new(config).is_err());

        let config = LoadConfig {
            report_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoadError::ZeroReportInterval)
        ));

        let config = LoadConfig {
            spawn_rate: 0.25,
            ..Default::default()
        };
        assert_eq!(config.spawn_interval().unwrap(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_time_stops_all_users() {
        let config = LoadConfig {
            host: serve().await,
            users: 4,
            spawn_rate: 100.0,
            think: ThinkTime::new(0.01, 0.02).unwrap(),
            run_time: Some(Duration::from_millis(400)),
            report_interval: Duration::from_millis(100),
            ..Default::default()
        };
        let runner = LoadRunner::new(config).unwrap();
        let stats = runner.stats();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), runner.run())
            .await
            .expect("run did not stop");

        assert!(snapshot.total_requests() > 0);
        assert_eq!(snapshot.total_failures(), 0);
        assert!(snapshot
            .rows
            .iter()
            .all(|r| r.endpoint != Endpoint::Crash));
        assert_eq!(stats.active_users(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_run_during_spawn() {
        let config = LoadConfig {
            host: serve().await,
            users: 50,
            spawn_rate: 1.0,
            think: ThinkTime::new(0.05, 0.05).unwrap(),
            ..Default::default()
        };
        let runner = LoadRunner::new(config).unwrap();
        let cancel = runner.cancel_token();
        let stats = runner.stats();

        let handle = tokio::spawn(runner.run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("run did not stop")
            .unwrap();
        // Only the first user was spawned before cancellation
        assert_eq!(stats.active_users(), 0);
        assert!(stats.total_requests() >= 1);
    }
}
