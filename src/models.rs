//! Wire models for the dispatcher queue and the provider exchange.
//!
//! Inbound, on the dispatcher queue, one [`MusicRequest`] per message:
//!
//! ```json
//! {
//!   "uuid": "0191d9a4-4a55-7cc2-9d5e-0a8c3c1f5b11",
//!   "server_id": "248017453917011968",
//!   "query": [
//!     "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
//!     "never gonna give you up"
//!   ],
//!   "shuffle": false
//! }
//! ```
//!
//! Outbound, on the provider exchange, one [`ProviderOperation`] per query,
//! published with `provider` as routing key:
//!
//! ```json
//! {
//!   "uuid": "0191d9a4-4a55-7cc2-9d5e-0a8c3c1f5b11",
//!   "server_id": "248017453917011968",
//!   "provider": "provider.video.query",
//!   "operation": "query",
//!   "shuffle": false,
//!   "query": "never gonna give you up"
//! }
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::sources::{Operation, SourcePair};

/// Batch request as consumed from the dispatcher queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct MusicRequest {
    /// Correlation id, unique per request
    #[builder(into)]
    pub uuid: String,
    #[builder(into)]
    pub server_id: String,
    /// Raw queries, each a link or free text
    #[builder(default)]
    pub query: Vec<String>,
    #[serde(default)]
    #[builder(default)]
    pub shuffle: bool,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid query at index {index}: expected string, found {found}")]
    InvalidQuery { index: usize, found: &'static str },
}

impl MusicRequest {
    /// Decode a queue payload
    ///
    /// Non-string query items are reported as [`DecodeError::InvalidQuery`]
    /// with their position; every other schema violation is
    /// [`DecodeError::Malformed`].
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(payload)?;

        if let Some(items) = value.get("query").and_then(Value::as_array) {
            if let Some((index, item)) = items.iter().enumerate().find(|(_, v)| !v.is_string()) {
                return Err(DecodeError::InvalidQuery {
                    index,
                    found: json_kind(item),
                });
            }
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Single unit of provider work, one per classified query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOperation {
    pub uuid: String,
    pub server_id: String,
    /// `<namespace>.<handler_type>.<operation>`, also the routing key
    pub provider: String,
    pub operation: Operation,
    pub shuffle: bool,
    pub query: String,
}

impl ProviderOperation {
    /// Build the operation for one classified query of `request`
    ///
    /// Returns `None` for pairs without an operation (null handler).
    pub fn from_pair(request: &MusicRequest, pair: &SourcePair, namespace: &str) -> Option<Self> {
        let operation = pair.operation?;
        let provider = pair.routing_key(namespace)?;

        Some(Self {
            uuid: request.uuid.clone(),
            server_id: request.server_id.clone(),
            provider,
            operation,
            shuffle: request.shuffle,
            query: pair.query.clone(),
        })
    }
}
