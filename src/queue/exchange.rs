use async_trait::async_trait;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::channel::{Delivery, QueueHandle};
use super::topic;
use crate::messaging::{Message, MessageProducer, Result};

#[derive(Debug, Clone)]
struct Binding {
    pattern: String,
    queue: QueueHandle,
}

/// Topic exchange routing messages to every queue whose binding pattern
/// matches the routing key
///
/// Unroutable messages are dropped, as on a broker without an alternate
/// exchange.
#[derive(Debug)]
pub struct TopicExchange {
    name: String,
    bindings: RwLock<Vec<Binding>>,
    publish_timeout: Duration,
}

impl TopicExchange {
    pub fn new(name: impl Into<String>, publish_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            bindings: RwLock::new(Vec::new()),
            publish_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind(&self, pattern: impl Into<String>, queue: QueueHandle) {
        let pattern = pattern.into();
        info!(exchange = %self.name, queue = queue.name(), %pattern, "Binding queue");
        let mut bindings = self.bindings.write().unwrap_or_else(|poisoned| {
            warn!(exchange = %self.name, "Binding table lock poisoned, recovering");
            poisoned.into_inner()
        });
        bindings.push(Binding { pattern, queue });
    }

    // A panic can only interrupt a push, so a poisoned table is still whole.
    fn bindings(&self) -> RwLockReadGuard<'_, Vec<Binding>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn route(&self, routing_key: &str) -> Vec<QueueHandle> {
        self.bindings()
            .iter()
            .filter(|b| topic::matches(&b.pattern, routing_key))
            .map(|b| b.queue.clone())
            .collect()
    }

    /// Publish and return the number of queues the message reached
    pub async fn publish_routed(&self, message: Message) -> Result<usize> {
        let targets = self.route(&message.routing_key);

        if targets.is_empty() {
            debug!(exchange = %self.name, routing_key = %message.routing_key, "Unroutable message dropped");
            return Ok(0);
        }

        for queue in &targets {
            queue
                .push(Delivery::new(message.clone()), self.publish_timeout)
                .await?;
        }

        debug!(
            exchange = %self.name,
            routing_key = %message.routing_key,
            queues = targets.len(),
            "Message routed"
        );
        Ok(targets.len())
    }
}

#[async_trait]
impl MessageProducer for TopicExchange {
    async fn publish(&self, message: Message) -> Result<()> {
        self.publish_routed(message).await.map(|_| ())
    }

    async fn health(&self) -> bool {
        self.bindings().iter().all(|b| !b.queue.is_closed())
    }
}
