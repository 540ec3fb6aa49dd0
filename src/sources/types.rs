use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider a query is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Spotify,
    Video,
    Null,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Spotify => "spotify",
            SourceType::Video => "video",
            SourceType::Null => "null",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the provider should do with the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Fetch a single item by URL
    Url,
    /// Expand a playlist URL into its items
    Playlist,
    /// Free-text search
    Query,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Url => "url",
            Operation::Playlist => "playlist",
            Operation::Query => "query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for a single query
///
/// `operation` is `None` only for queries that fell through to the null
/// handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePair {
    pub query: String,
    pub handler_type: SourceType,
    pub operation: Option<Operation>,
}

impl SourcePair {
    pub fn new(query: impl Into<String>, handler_type: SourceType, operation: Operation) -> Self {
        Self {
            query: query.into(),
            handler_type,
            operation: Some(operation),
        }
    }

    pub fn unclassified(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            handler_type: SourceType::Null,
            operation: None,
        }
    }

    /// Routing key `<namespace>.<handler_type>.<operation>`
    ///
    /// Returns `None` when there is no operation to route.
    pub fn routing_key(&self, namespace: &str) -> Option<String> {
        self.operation
            .map(|op| format!("{}.{}.{}", namespace, self.handler_type, op))
    }
}
