//! Query classification
//!
//! Each raw query of a request is run through an ordered chain of
//! [`SourceHandler`]s. The first handler that accepts the query classifies it
//! into a [`SourcePair`] naming the provider and the operation to perform.
//!
//! ## Key Components
//!
//! - [`SourceHandler`] - accept/classify contract shared by all handlers
//! - [`SpotifyHandler`], [`VideoUrlHandler`] - link handlers
//! - [`VideoQueryHandler`] - free-text search fallback
//! - [`NullHandler`] - terminal handler, accepts anything
//! - [`SourceChain`] - ordered handler list
//!
//! ## Example
//!
//! ```rust
//! use dispatchbox::sources::{Operation, SourceChain, SourceType};
//!
//! let chain = SourceChain::with_defaults();
//! let pairs = chain.process_queries(&["never gonna give you up"], false);
//! assert_eq!(pairs[0].handler_type, SourceType::Video);
//! assert_eq!(pairs[0].operation, Some(Operation::Query));
//! ```

mod chain;
mod null;
mod spotify;
mod traits;
mod types;
pub mod url;
mod video;

pub use chain::SourceChain;
pub use null::NullHandler;
pub use spotify::SpotifyHandler;
pub use traits::{SourceError, SourceHandler};
pub use types::{Operation, SourcePair, SourceType};
pub use video::{VideoQueryHandler, VideoUrlHandler};
