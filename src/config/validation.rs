use super::models::Config;
use crate::sources::{SourceChain, SourceError};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("'{field}' must not be empty")]
    EmptyName { field: String },

    #[error("Routing namespace '{0}' must be a single word (no '.', '*' or '#')")]
    InvalidNamespace(String),

    #[error("max_consumers must be positive")]
    ZeroConsumers,

    #[error("queue_capacity must be positive")]
    ZeroQueueCapacity,

    #[error("Provider queue '{queue}' has an empty binding pattern")]
    EmptyBindingPattern { queue: String },

    #[error("Queue name '{0}' is declared more than once")]
    DuplicateQueue(String),

    #[error("Invalid source chain: {0}")]
    InvalidChain(#[from] SourceError),

    #[error("Liveness status {0} is not a 2xx status code")]
    InvalidLivenessStatus(u16),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_names(config)?;
    validate_broker(config)?;
    validate_providers(config)?;
    validate_sources(config)?;
    validate_probes(config)?;
    Ok(())
}

fn validate_names(config: &Config) -> Result<(), ValidationError> {
    let queues = &config.queues;
    let names = [
        ("service.app_id", &config.service.app_id),
        ("queues.dispatcher", &queues.dispatcher),
        ("queues.provider_exchange", &queues.provider_exchange),
        ("queues.routing_namespace", &queues.routing_namespace),
        ("queues.dead_letter.exchange", &queues.dead_letter.exchange),
        ("queues.dead_letter.queue", &queues.dead_letter.queue),
        ("queues.dead_letter.routing_key", &queues.dead_letter.routing_key),
        ("queues.parking_lot", &queues.parking_lot),
    ];

    for (field, value) in names {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                field: field.to_string(),
            });
        }
    }

    if queues
        .routing_namespace
        .contains(|c| matches!(c, '.' | '*' | '#'))
    {
        return Err(ValidationError::InvalidNamespace(queues.routing_namespace.clone()));
    }

    Ok(())
}

fn validate_broker(config: &Config) -> Result<(), ValidationError> {
    if config.broker.max_consumers == 0 {
        return Err(ValidationError::ZeroConsumers);
    }
    if config.broker.queue_capacity == 0 {
        return Err(ValidationError::ZeroQueueCapacity);
    }
    Ok(())
}

/// Provider queues need a pattern; every declared queue name must be unique
fn validate_providers(config: &Config) -> Result<(), ValidationError> {
    let mut declared = HashSet::new();
    let service_queues = [
        &config.queues.dispatcher,
        &config.queues.dead_letter.queue,
        &config.queues.parking_lot,
    ];

    for queue in service_queues.into_iter().chain(config.providers.keys()) {
        if !declared.insert(queue.as_str()) {
            return Err(ValidationError::DuplicateQueue(queue.clone()));
        }
    }

    for (queue, pattern) in &config.providers {
        if pattern.trim().is_empty() {
            return Err(ValidationError::EmptyBindingPattern {
                queue: queue.clone(),
            });
        }
    }

    Ok(())
}

fn validate_sources(config: &Config) -> Result<(), ValidationError> {
    SourceChain::from_config(&config.sources)?;
    Ok(())
}

fn validate_probes(config: &Config) -> Result<(), ValidationError> {
    let status = config.probes.liveness_status;
    if !(200..300).contains(&status) {
        return Err(ValidationError::InvalidLivenessStatus(status));
    }
    Ok(())
}
