use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::messaging::{Message, MessagingError, Result};

/// Message handed to a consumer, with the number of times it was requeued
#[derive(Clone, Debug)]
pub struct Delivery {
    pub message: Message,
    pub redelivery_count: u32,
}

impl Delivery {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            redelivery_count: 0,
        }
    }
}

/// Producer side of a named queue
///
/// Cloned into every binding and every component that enqueues directly.
#[derive(Clone, Debug)]
pub struct QueueHandle {
    name: Arc<str>,
    sender: mpsc::Sender<Delivery>,
}

/// Consumer side of a named queue
#[derive(Debug)]
pub struct QueueReceiver {
    name: Arc<str>,
    receiver: mpsc::Receiver<Delivery>,
}

/// Declare a bounded queue
pub fn declare(name: &str, capacity: usize) -> (QueueHandle, QueueReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let name: Arc<str> = Arc::from(name);
    (
        QueueHandle {
            name: name.clone(),
            sender,
        },
        QueueReceiver { name, receiver },
    )
}

impl QueueHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue, waiting at most `timeout` for capacity
    pub async fn push(&self, delivery: Delivery, timeout: Duration) -> Result<()> {
        match self.sender.send_timeout(delivery, timeout).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
                Err(MessagingError::Timeout(self.name.to_string()))
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                Err(MessagingError::QueueClosed(self.name.to_string()))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl QueueReceiver {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Non-blocking receive; `None` when the queue is currently empty
    pub fn try_recv(&mut self) -> Option<Delivery> {
        match self.receiver.try_recv() {
            Ok(delivery) => Some(delivery),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<Delivery> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
