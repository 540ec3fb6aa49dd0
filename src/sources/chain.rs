use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, trace};

use super::null::NullHandler;
use super::spotify::SpotifyHandler;
use super::traits::{SourceError, SourceHandler};
use super::types::SourcePair;
use super::video::{VideoQueryHandler, VideoUrlHandler};
use crate::config::SourcesConfig;

/// Ordered list of source handlers; the first one accepting a query wins
///
/// The chain always ends with [`NullHandler`], so every query produces
/// exactly one [`SourcePair`]. Handlers are stateless and the chain is
/// shared between concurrent dispatches behind an `Arc`.
#[derive(Clone)]
pub struct SourceChain {
    handlers: Vec<Arc<dyn SourceHandler>>,
}

impl std::fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name()))
            .finish()
    }
}

impl SourceChain {
    /// Build a chain from an explicit handler order
    ///
    /// Rejects chains that could leave a query unclassified or that contain
    /// handlers no query can ever reach.
    pub fn new(handlers: Vec<Arc<dyn SourceHandler>>) -> Result<Self, SourceError> {
        let last = handlers.last().ok_or(SourceError::EmptyChain)?;
        if last.name() != NullHandler::NAME {
            return Err(SourceError::MissingTerminal(last.name().to_string()));
        }

        let mut seen = HashSet::new();
        let mut search: Option<&'static str> = None;
        for (position, handler) in handlers.iter().enumerate() {
            if !seen.insert(handler.name()) {
                return Err(SourceError::Duplicate(handler.name().to_string()));
            }
            if position + 1 < handlers.len() && handler.name() == NullHandler::NAME {
                return Err(SourceError::Unreachable {
                    handler: handlers[position + 1].name().to_string(),
                    position: position + 1,
                });
            }
            if handler.is_url_handler() {
                if let Some(search) = search {
                    return Err(SourceError::SearchBeforeUrl {
                        search: search.to_string(),
                        url_handler: handler.name().to_string(),
                    });
                }
            } else if handler.name() != NullHandler::NAME {
                search = Some(handler.name());
            }
        }

        Ok(Self { handlers })
    }

    /// Spotify, video link, video search, null
    pub fn with_defaults() -> Self {
        Self {
            handlers: vec![
                Arc::new(SpotifyHandler::default()),
                Arc::new(VideoUrlHandler::default()),
                Arc::new(VideoQueryHandler::new()),
                Arc::new(NullHandler::new()),
            ],
        }
    }

    /// Build the chain named in configuration
    pub fn from_config(config: &SourcesConfig) -> Result<Self, SourceError> {
        let handlers = config
            .chain
            .iter()
            .map(|name| build_handler(name, config))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(handlers)
    }

    /// Handler names in evaluation order
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Classify a single query
    pub fn classify(&self, query: &str) -> SourcePair {
        for handler in &self.handlers {
            if handler.accepts(query) {
                trace!(query, handler = handler.name(), "Handler accepted query");
                return handler.classify(query);
            }
        }
        // Unreachable for chains built through `new`, which end with null
        SourcePair::unclassified(query)
    }

    /// Classify every query, preserving input order
    ///
    /// `shuffle` does not influence classification; it is carried to the
    /// providers on each operation.
    pub fn process_queries<S: AsRef<str>>(&self, queries: &[S], shuffle: bool) -> Vec<SourcePair> {
        debug!(count = queries.len(), shuffle, "Processing queries");
        queries.iter().map(|q| self.classify(q.as_ref())).collect()
    }
}

impl Default for SourceChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_handler(
    name: &str,
    config: &SourcesConfig,
) -> Result<Arc<dyn SourceHandler>, SourceError> {
    let handler: Arc<dyn SourceHandler> = match name {
        SpotifyHandler::NAME => Arc::new(SpotifyHandler::new(config.spotify_markers.clone())),
        VideoUrlHandler::NAME => Arc::new(VideoUrlHandler::new(
            config.video_markers.clone(),
            config.playlist_marker.clone(),
        )),
        VideoQueryHandler::NAME => Arc::new(VideoQueryHandler::new()),
        NullHandler::NAME => Arc::new(NullHandler::new()),
        other => return Err(SourceError::UnknownHandler(other.to_string())),
    };
    Ok(handler)
}
