// Simulated user
//
// Loop: pick a task, issue the request, wait for the outcome, think, repeat.
// There is no terminal state; only cancellation ends the loop. Failures are
// recorded and the loop carries on.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::stats::LoadStats;
use crate::task::{TaskSet, ThinkTime};

pub struct SimulatedUser {
    id: usize,
    client: Arc<Client>,
    tasks: Arc<TaskSet>,
    think: ThinkTime,
    stats: Arc<LoadStats>,
    rng: StdRng,
}

impl SimulatedUser {
    /// Each user seeds its own RNG from OS entropy
    pub fn new(
        id: usize,
        client: Arc<Client>,
        tasks: Arc<TaskSet>,
        think: ThinkTime,
        stats: Arc<LoadStats>,
    ) -> Self {
        Self {
            id,
            client,
            tasks,
            think,
            stats,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the RNG (reproducible tests)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Run until cancelled. Returns the number of completed requests.
    ///
    /// A request still in flight at cancellation is abandoned and not counted.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        self.stats.user_started();
        tracing::debug!(user = self.id, "User started");

        let mut completed = 0u64;
        loop {
            let endpoint = self.tasks.pick(&mut self.rng);

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.client.call(endpoint) => result,
            };

            match result {
                Ok(outcome) => {
                    self.stats.record_success(endpoint, outcome.elapsed);
                }
                Err(failure) => {
                    tracing::debug!(
                        user = self.id,
                        endpoint = %endpoint,
                        kind = %failure.kind(),
                        error = %failure,
                        "Request failed"
                    );
                    self.stats.record_failure(endpoint, &failure);
                }
            }
            completed += 1;

            let pause = self.think.sample(&mut self.rng);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.stats.user_stopped();
        tracing::debug!(user = self.id, completed, "User stopped");
        completed
    }
}
