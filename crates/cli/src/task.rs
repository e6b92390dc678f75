// Task selection and think time for simulated users

use std::time::Duration;

use loadbench_core::{Endpoint, ParseEndpointError};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use thiserror::Error;

/// Default task mix: uniform over compute, io and status
pub const DEFAULT_TASKS: &str = "compute:1,io:1,status:1";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid task entry '{0}' (expected endpoint or endpoint:weight)")]
    InvalidTaskSpec(String),

    #[error(transparent)]
    UnknownEndpoint(#[from] ParseEndpointError),

    #[error("task set is empty")]
    EmptyTaskSet,

    #[error("all task weights are zero")]
    ZeroWeights,

    #[error("task weights sum to {0}, more than {max}", max = u32::MAX)]
    WeightOverflow(u64),

    #[error("invalid think time: min {min}s, max {max}s")]
    InvalidWait { min: f64, max: f64 },

    #[error("number of users must be at least 1")]
    ZeroUsers,

    #[error("spawn rate must be a positive number, got {0}")]
    InvalidSpawnRate(f64),

    #[error("report interval must be greater than zero")]
    ZeroReportInterval,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// An endpoint and its relative weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTask {
    pub endpoint: Endpoint,
    pub weight: u32,
}

/// Weighted set of tasks a user picks from
#[derive(Debug, Clone)]
pub struct TaskSet {
    tasks: Vec<LoadTask>,
    index: WeightedIndex<u32>,
}

impl TaskSet {
    pub fn new(tasks: Vec<LoadTask>) -> Result<Self, LoadError> {
        if tasks.is_empty() {
            return Err(LoadError::EmptyTaskSet);
        }
        if tasks.iter().all(|t| t.weight == 0) {
            return Err(LoadError::ZeroWeights);
        }
        // WeightedIndex accumulates in the weight type
        let total: u64 = tasks.iter().map(|t| u64::from(t.weight)).sum();
        if total > u64::from(u32::MAX) {
            return Err(LoadError::WeightOverflow(total));
        }

        let index = WeightedIndex::new(tasks.iter().map(|t| t.weight))
            .map_err(|_| LoadError::ZeroWeights)?;
        Ok(Self { tasks, index })
    }

    /// Parse `compute:1,io:2,status` (a missing weight means 1)
    pub fn parse(spec: &str) -> Result<Self, LoadError> {
        let mut tasks: Vec<LoadTask> = Vec::new();

        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, weight) = match entry.split_once(':') {
                Some((name, weight)) => {
                    let weight = weight
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| LoadError::InvalidTaskSpec(entry.to_string()))?;
                    (name, weight)
                }
                None => (entry, 1),
            };

            let endpoint: Endpoint = name.parse()?;
            match tasks.iter_mut().find(|t| t.endpoint == endpoint) {
                Some(existing) => {
                    existing.weight = existing
                        .weight
                        .checked_add(weight)
                        .ok_or_else(|| LoadError::InvalidTaskSpec(entry.to_string()))?;
                }
                None => tasks.push(LoadTask { endpoint, weight }),
            }
        }

        Self::new(tasks)
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Endpoint {
        self.tasks[self.index.sample(rng)].endpoint
    }

    pub fn tasks(&self) -> &[LoadTask] {
        &self.tasks
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        let tasks = Endpoint::LOAD_DEFAULT
            .into_iter()
            .map(|endpoint| LoadTask {
                endpoint,
                weight: 1,
            })
            .collect::<Vec<_>>();
        let index = WeightedIndex::new(tasks.iter().map(|t| t.weight))
            .expect("default weights are non-zero");
        Self { tasks, index }
    }
}

/// Uniform pause between a response and the next request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThinkTime {
    min: Duration,
    max: Duration,
}

impl ThinkTime {
    pub fn new(min_secs: f64, max_secs: f64) -> Result<Self, LoadError> {
        let valid = min_secs.is_finite() && max_secs.is_finite() && min_secs >= 0.0;
        if !valid || min_secs > max_secs {
            return Err(LoadError::InvalidWait {
                min: min_secs,
                max: max_secs,
            });
        }

        Ok(Self {
            min: Duration::from_secs_f64(min_secs),
            max: Duration::from_secs_f64(max_secs),
        })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}

impl Default for ThinkTime {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3),
        }
    }
}
