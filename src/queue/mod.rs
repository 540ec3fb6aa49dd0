pub mod broker;
pub mod channel;
pub mod exchange;
pub mod topic;

pub use broker::{Broker, Consumers};
pub use channel::{Delivery, QueueHandle, QueueReceiver};
pub use exchange::TopicExchange;
