//! API models for the dispatch ingress and operator endpoints.
//!
//! `POST /dispatch` accepts an [`IngestRequest`]:
//!
//! ```json
//! {
//!   "uuid": "0192c5e4-7b1a-7cc3-9a4e-3f1f2a6d9b10",
//!   "server_id": "481516234",
//!   "query": [
//!     "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
//!     "never gonna give you up"
//!   ],
//!   "shuffle": false
//! }
//! ```
//!
//! `uuid` is optional; a UUIDv7 is generated when it is missing. The request
//! is enqueued on the dispatcher queue and answered with
//! [`IngestAccepted`] (`202 Accepted`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone)]
pub struct IngestRequest {
    #[serde(default)]
    pub uuid: Option<String>,
    pub server_id: String,
    #[serde(default)]
    pub query: Vec<String>,
    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IngestAccepted {
    pub uuid: String,
    pub queries: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
