pub mod api;
pub mod config;
pub mod dispatch;
pub mod messaging;
pub mod models;
pub mod observability;
pub mod queue;
pub mod sources;
pub mod worker;
