use tracing::debug;

use super::traits::SourceHandler;
use super::types::{Operation, SourcePair, SourceType};
use super::url::{contains_any, is_url};

/// Spotify links (tracks, albums, playlists alike)
///
/// Every accepted link maps to [`Operation::Url`]; the Spotify provider
/// resolves the link kind itself.
#[derive(Debug, Clone)]
pub struct SpotifyHandler {
    markers: Vec<String>,
}

impl SpotifyHandler {
    pub const NAME: &'static str = "spotify";

    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl Default for SpotifyHandler {
    fn default() -> Self {
        Self::new(vec!["spotify".to_string()])
    }
}

impl SourceHandler for SpotifyHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::Spotify
    }

    fn is_url_handler(&self) -> bool {
        true
    }

    fn accepts(&self, query: &str) -> bool {
        !query.trim().is_empty() && contains_any(query, &self.markers) && is_url(query)
    }

    fn classify(&self, query: &str) -> SourcePair {
        debug!(query, "Classified spotify source");
        SourcePair::new(query, SourceType::Spotify, Operation::Url)
    }
}
