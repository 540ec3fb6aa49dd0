use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub queues: QueuesConfig,
    /// Provider queue name -> binding pattern on the provider exchange
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub probes: ProbesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            broker: BrokerConfig::default(),
            queues: QueuesConfig::default(),
            providers: default_providers(),
            sources: SourcesConfig::default(),
            probes: ProbesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
        }
    }
}

fn default_app_id() -> String {
    "dispatchbox".to_string()
}

/// Broker and consumer tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// Maximum number of requests dispatched concurrently
    #[serde(default = "default_max_consumers")]
    pub max_consumers: usize,
    /// Capacity of every declared queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
    /// How long in-flight dispatches may run after a shutdown signal
    #[serde(default = "default_graceful_timeout_ms")]
    pub graceful_timeout_ms: u64,
}

impl BrokerConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_timeout_ms)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_consumers: default_max_consumers(),
            queue_capacity: default_queue_capacity(),
            publish_timeout_ms: default_publish_timeout_ms(),
            graceful_timeout_ms: default_graceful_timeout_ms(),
        }
    }
}

fn default_max_consumers() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_publish_timeout_ms() -> u64 {
    5_000
}

fn default_graceful_timeout_ms() -> u64 {
    10_000
}

/// Queue and exchange names
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueuesConfig {
    #[serde(default = "default_dispatcher_queue")]
    pub dispatcher: String,
    #[serde(default = "default_provider_exchange")]
    pub provider_exchange: String,
    /// First word of every provider routing key
    #[serde(default = "default_routing_namespace")]
    pub routing_namespace: String,
    /// Requeues before a failing request is dead-lettered
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
    #[serde(default)]
    pub dead_letter: DeadLetterConfig,
    #[serde(default = "default_parking_lot")]
    pub parking_lot: String,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            dispatcher: default_dispatcher_queue(),
            provider_exchange: default_provider_exchange(),
            routing_namespace: default_routing_namespace(),
            max_redeliveries: default_max_redeliveries(),
            dead_letter: DeadLetterConfig::default(),
            parking_lot: default_parking_lot(),
        }
    }
}

fn default_dispatcher_queue() -> String {
    "dispatch".to_string()
}

fn default_provider_exchange() -> String {
    "providers".to_string()
}

fn default_routing_namespace() -> String {
    "provider".to_string()
}

fn default_max_redeliveries() -> u32 {
    3
}

fn default_parking_lot() -> String {
    "parking-lot".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeadLetterConfig {
    #[serde(default = "default_dlx")]
    pub exchange: String,
    #[serde(default = "default_dlq")]
    pub queue: String,
    #[serde(default = "default_dlq_routing_key")]
    pub routing_key: String,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            exchange: default_dlx(),
            queue: default_dlq(),
            routing_key: default_dlq_routing_key(),
        }
    }
}

fn default_dlx() -> String {
    "dispatch.dlx".to_string()
}

fn default_dlq() -> String {
    "dispatch.dlq".to_string()
}

fn default_dlq_routing_key() -> String {
    "dispatch.dead".to_string()
}

fn default_providers() -> BTreeMap<String, String> {
    [
        ("spotify".to_string(), "provider.spotify.#".to_string()),
        ("video".to_string(), "provider.video.#".to_string()),
    ]
    .into()
}

/// Source chain order and handler markers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    /// Handler names in evaluation order, must end with "null"
    #[serde(default = "default_chain")]
    pub chain: Vec<String>,
    #[serde(default = "default_spotify_markers")]
    pub spotify_markers: Vec<String>,
    #[serde(default = "default_video_markers")]
    pub video_markers: Vec<String>,
    #[serde(default = "default_playlist_marker")]
    pub playlist_marker: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            spotify_markers: default_spotify_markers(),
            video_markers: default_video_markers(),
            playlist_marker: default_playlist_marker(),
        }
    }
}

fn default_chain() -> Vec<String> {
    ["spotify", "video", "video_query", "null"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_spotify_markers() -> Vec<String> {
    vec!["spotify".to_string()]
}

fn default_video_markers() -> Vec<String> {
    vec!["youtube".to_string(), "youtu.be".to_string()]
}

fn default_playlist_marker() -> String {
    "list=".to_string()
}

/// Operator HTTP endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbesConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_liveness_status")]
    pub liveness_status: u16,
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
}

impl ProbesConfig {
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            liveness_status: default_liveness_status(),
            readiness_timeout_ms: default_readiness_timeout_ms(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_liveness_status() -> u16 {
    204
}

fn default_readiness_timeout_ms() -> u64 {
    1_000
}
