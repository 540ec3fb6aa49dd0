//! Message publishing abstraction
//!
//! The dispatcher publishes through [`MessageProducer`] so it can run against
//! the in-process broker or a recording stub in tests.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

pub const HEADER_CORRELATION_ID: &str = "x-correlation-id";
pub const HEADER_SUB_QUERY: &str = "x-sub-query";
pub const HEADER_REDELIVERY_COUNT: &str = "x-redelivery-count";
pub const HEADER_DEATH_REASON: &str = "x-death-reason";

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Publish to '{0}' timed out")]
    Timeout(String),

    #[error("Queue closed: {0}")]
    QueueClosed(String),

    #[error("Encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MessagingError>;

/// Routed message with string headers and a JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub routing_key: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            routing_key: routing_key.into(),
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn json<T: Serialize>(routing_key: impl Into<String>, payload: &T) -> Result<Self> {
        Ok(Self::new(routing_key, serde_json::to_vec(payload)?))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Message producer for publishing provider operations
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish message, routed by its routing key
    async fn publish(&self, message: Message) -> Result<()>;

    /// Health check
    async fn health(&self) -> bool;
}

/// Producer that keeps every published message in memory
///
/// Optionally fails once a given number of messages went through.
#[derive(Debug, Default)]
pub struct RecordingProducer {
    published: Mutex<Vec<Message>>,
    fail_after: Option<usize>,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` messages, reject everything after
    pub fn failing_after(count: usize) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_after: Some(count),
        }
    }

    pub fn published(&self) -> Vec<Message> {
        self.published
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageProducer for RecordingProducer {
    async fn publish(&self, message: Message) -> Result<()> {
        let mut published = self
            .published
            .lock()
            .map_err(|_| MessagingError::PublishFailed("recorder poisoned".to_string()))?;

        if self.fail_after.is_some_and(|limit| published.len() >= limit) {
            return Err(MessagingError::PublishFailed(format!(
                "rejected {}",
                message.routing_key
            )));
        }

        tracing::debug!(routing_key = %message.routing_key, size = message.body.len(), "Recorded publish");
        published.push(message);
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_producer_fails_after_limit() {
        let producer = RecordingProducer::failing_after(1);
        producer.publish(Message::new("a.b.c", vec![])).await.unwrap();
        let err = producer.publish(Message::new("a.b.d", vec![])).await.unwrap_err();
        assert!(matches!(err, MessagingError::PublishFailed(_)));
        assert_eq!(producer.published().len(), 1);
    }

    #[test]
    fn test_message_headers() {
        let message = Message::new("provider.video.url", b"{}".to_vec())
            .with_header(HEADER_SUB_QUERY, "hello");
        assert_eq!(message.header(HEADER_SUB_QUERY), Some("hello"));
        assert_eq!(message.header(HEADER_CORRELATION_ID), None);
    }
}
