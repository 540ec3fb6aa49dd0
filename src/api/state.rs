use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::Broker;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub broker: Arc<Broker>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, broker: Arc<Broker>, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            broker,
            metrics,
        }
    }
}
