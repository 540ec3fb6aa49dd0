use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::channel::{self, Delivery, QueueHandle, QueueReceiver};
use super::exchange::TopicExchange;
use crate::config::Config;
use crate::messaging::{Message, MessageProducer, MessagingError, Result};

/// In-process broker holding the declared topology
///
/// Topology, declared once by [`Broker::declare`]:
/// - dispatcher queue, fed by the ingress and by requeues
/// - provider topic exchange, one queue per configured provider binding
/// - dead-letter topic exchange bound to the dead-letter queue
/// - parking-lot queue for messages that can never be processed
///
/// Producer handles live here; the consumer halves are returned once in
/// [`Consumers`] and owned by whoever drains them.
#[derive(Debug)]
pub struct Broker {
    dispatcher: QueueHandle,
    provider_exchange: Arc<TopicExchange>,
    dead_letter_exchange: Arc<TopicExchange>,
    dead_letter_routing_key: String,
    parking_lot: QueueHandle,
    publish_timeout: Duration,
    closed: AtomicBool,
}

/// Consumer halves of every declared queue
#[derive(Debug)]
pub struct Consumers {
    pub dispatcher: QueueReceiver,
    pub providers: Vec<QueueReceiver>,
    pub dead_letter: QueueReceiver,
    pub parking_lot: QueueReceiver,
}

impl Broker {
    pub fn declare(config: &Config) -> (Self, Consumers) {
        let capacity = config.broker.queue_capacity;
        let publish_timeout = config.broker.publish_timeout();
        let queues = &config.queues;

        info!(
            dispatcher = %queues.dispatcher,
            exchange = %queues.provider_exchange,
            capacity,
            "Declaring broker topology"
        );

        let (dispatcher, dispatcher_rx) = channel::declare(&queues.dispatcher, capacity);

        let provider_exchange = TopicExchange::new(&queues.provider_exchange, publish_timeout);
        let providers = config
            .providers
            .iter()
            .map(|(name, pattern)| {
                let (handle, receiver) = channel::declare(name, capacity);
                provider_exchange.bind(pattern.as_str(), handle);
                receiver
            })
            .collect();

        let dead_letter_exchange = TopicExchange::new(&queues.dead_letter.exchange, publish_timeout);
        let (dlq, dlq_rx) = channel::declare(&queues.dead_letter.queue, capacity);
        dead_letter_exchange.bind(queues.dead_letter.routing_key.as_str(), dlq);

        let (parking_lot, parking_lot_rx) = channel::declare(&queues.parking_lot, capacity);

        let broker = Self {
            dispatcher,
            provider_exchange: Arc::new(provider_exchange),
            dead_letter_exchange: Arc::new(dead_letter_exchange),
            dead_letter_routing_key: queues.dead_letter.routing_key.clone(),
            parking_lot,
            publish_timeout,
            closed: AtomicBool::new(false),
        };

        let consumers = Consumers {
            dispatcher: dispatcher_rx,
            providers,
            dead_letter: dlq_rx,
            parking_lot: parking_lot_rx,
        };

        (broker, consumers)
    }

    /// Producer publishing to the provider exchange
    pub fn provider_exchange(&self) -> Arc<TopicExchange> {
        self.provider_exchange.clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::QueueClosed("broker".to_string()));
        }
        Ok(())
    }

    /// Enqueue a message on the dispatcher queue
    pub async fn enqueue(&self, message: Message) -> Result<()> {
        self.requeue(Delivery::new(message)).await
    }

    /// Put a delivery back on the dispatcher queue, keeping its count
    pub async fn requeue(&self, delivery: Delivery) -> Result<()> {
        self.ensure_open()?;
        debug!(
            queue = self.dispatcher.name(),
            redelivery_count = delivery.redelivery_count,
            "Enqueueing request"
        );
        self.dispatcher.push(delivery, self.publish_timeout).await
    }

    /// Route a message to the dead-letter queue
    pub async fn dead_letter(&self, message: Message) -> Result<()> {
        self.ensure_open()?;
        let message = Message {
            routing_key: self.dead_letter_routing_key.clone(),
            ..message
        };
        self.dead_letter_exchange.publish(message).await
    }

    /// Move a message to the parking lot
    pub async fn park(&self, message: Message) -> Result<()> {
        self.ensure_open()?;
        self.parking_lot
            .push(Delivery::new(message), self.publish_timeout)
            .await
    }

    /// Ready when open and every declared queue still has a consumer
    pub async fn health(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
            && !self.dispatcher.is_closed()
            && !self.parking_lot.is_closed()
            && self.provider_exchange.health().await
            && self.dead_letter_exchange.health().await
    }

    /// Refuse new work; queued messages stay with their consumers
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Broker closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
