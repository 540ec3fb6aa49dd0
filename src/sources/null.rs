use tracing::debug;

use super::traits::SourceHandler;
use super::types::{SourcePair, SourceType};

/// Terminal handler, accepts anything
#[derive(Debug, Clone, Default)]
pub struct NullHandler;

impl NullHandler {
    pub const NAME: &'static str = "null";

    pub fn new() -> Self {
        Self
    }
}

impl SourceHandler for NullHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::Null
    }

    fn accepts(&self, _query: &str) -> bool {
        true
    }

    fn classify(&self, query: &str) -> SourcePair {
        debug!(query, "No handler matched source");
        SourcePair::unclassified(query)
    }
}
