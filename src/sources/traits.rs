use thiserror::Error;

use super::types::{SourcePair, SourceType};

/// Errors raised while building or running a source chain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("unknown source handler: {0}")]
    UnknownHandler(String),
    #[error("source chain is empty")]
    EmptyChain,
    #[error("source chain must end with the null handler, found '{0}'")]
    MissingTerminal(String),
    #[error("handler '{handler}' at position {position} is unreachable after 'null'")]
    Unreachable { handler: String, position: usize },
    #[error("search handler '{search}' must come after url handler '{url_handler}'")]
    SearchBeforeUrl { search: String, url_handler: String },
    #[error("handler '{0}' appears more than once")]
    Duplicate(String),
}

/// One link of the classification chain
///
/// Implementations must be pure: the same query always yields the same
/// answer, and `classify` is only called after `accepts` returned true.
pub trait SourceHandler: Send + Sync {
    /// Name used in chain configuration
    fn name(&self) -> &'static str;

    /// Provider this handler routes to
    fn source_type(&self) -> SourceType;

    /// Whether this handler only ever accepts well-formed URLs
    fn is_url_handler(&self) -> bool {
        false
    }

    fn accepts(&self, query: &str) -> bool;

    fn classify(&self, query: &str) -> SourcePair;
}
