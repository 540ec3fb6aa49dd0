//! Dispatch worker service
//!
//! Consumes the dispatcher queue with bounded concurrency, runs every request
//! through the [`Dispatcher`](crate::dispatch::Dispatcher) and settles each
//! delivery: ack, requeue, dead-letter or park.

pub mod runner;

pub use runner::{DeliveryOutcome, DispatchWorker, WorkerReport};

use std::time::Duration;

use crate::config::Config;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_consumers: usize,
    pub max_redeliveries: u32,
    pub graceful_timeout: Duration,
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_consumers: config.broker.max_consumers,
            max_redeliveries: config.queues.max_redeliveries,
            graceful_timeout: config.broker.graceful_timeout(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
