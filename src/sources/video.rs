use tracing::debug;

use super::traits::SourceHandler;
use super::types::{Operation, SourcePair, SourceType};
use super::url::{contains_any, has_http_scheme, is_url};

/// Video platform links
#[derive(Debug, Clone)]
pub struct VideoUrlHandler {
    markers: Vec<String>,
    playlist_marker: String,
}

impl VideoUrlHandler {
    pub const NAME: &'static str = "video";

    pub fn new(markers: Vec<String>, playlist_marker: impl Into<String>) -> Self {
        Self {
            markers,
            playlist_marker: playlist_marker.into(),
        }
    }
}

impl Default for VideoUrlHandler {
    fn default() -> Self {
        Self::new(vec!["youtube".to_string(), "youtu.be".to_string()], "list=")
    }
}

impl SourceHandler for VideoUrlHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::Video
    }

    fn is_url_handler(&self) -> bool {
        true
    }

    fn accepts(&self, query: &str) -> bool {
        !query.trim().is_empty() && contains_any(query, &self.markers) && is_url(query)
    }

    fn classify(&self, query: &str) -> SourcePair {
        let operation = if query.contains(self.playlist_marker.as_str()) {
            Operation::Playlist
        } else {
            Operation::Url
        };
        debug!(query, %operation, "Classified video source");
        SourcePair::new(query, SourceType::Video, operation)
    }
}

/// Free-text search on the video platform
///
/// Has no acceptance condition besides "not a link", so it must come after
/// every URL handler in the chain.
#[derive(Debug, Clone, Default)]
pub struct VideoQueryHandler;

impl VideoQueryHandler {
    pub const NAME: &'static str = "video_query";

    pub fn new() -> Self {
        Self
    }
}

impl SourceHandler for VideoQueryHandler {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn source_type(&self) -> SourceType {
        SourceType::Video
    }

    fn accepts(&self, query: &str) -> bool {
        !query.is_empty() && !has_http_scheme(query)
    }

    fn classify(&self, query: &str) -> SourcePair {
        debug!(query, "Classified video search query");
        SourcePair::new(query, SourceType::Video, Operation::Query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_url() {
        let handler = VideoUrlHandler::default();
        let query = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert!(handler.accepts(query));
        assert_eq!(handler.classify(query).operation, Some(Operation::Url));
    }

    #[test]
    fn test_video_playlist() {
        let handler = VideoUrlHandler::default();
        let query = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123";
        assert!(handler.accepts(query));
        let pair = handler.classify(query);
        assert_eq!(pair.handler_type, SourceType::Video);
        assert_eq!(pair.operation, Some(Operation::Playlist));
    }

    #[test]
    fn test_short_links() {
        let handler = VideoUrlHandler::default();
        assert!(handler.accepts("https://youtu.be/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_video_url_rejects_without_marker() {
        let handler = VideoUrlHandler::default();
        assert!(!handler.accepts("https://vimeo.com/12345?list=2"));
        assert!(!handler.accepts("youtube music"));
        assert!(!handler.accepts(""));
    }

    #[test]
    fn test_custom_markers() {
        let handler = VideoUrlHandler::new(vec!["video.example".to_string()], "list=");
        let query = "https://video.example/watch?v=1&list=2";
        assert!(handler.accepts(query));
        assert_eq!(handler.classify(query).operation, Some(Operation::Playlist));
    }

    #[test]
    fn test_query_accepts_free_text() {
        let handler = VideoQueryHandler::new();
        for query in ["hello world", "never gonna give you up", "a", "  padded  ", "   "] {
            assert!(handler.accepts(query), "{query}");
            let pair = handler.classify(query);
            assert_eq!(pair.handler_type, SourceType::Video);
            assert_eq!(pair.operation, Some(Operation::Query));
            assert_eq!(pair.query, query);
        }
    }

    #[test]
    fn test_query_rejects_links_and_empty() {
        let handler = VideoQueryHandler::new();
        assert!(!handler.accepts("https://vimeo.com/1"));
        assert!(!handler.accepts("HTTPS://vimeo.com/1"));
        assert!(!handler.accepts("http://"));
        assert!(!handler.accepts(""));
    }
}
