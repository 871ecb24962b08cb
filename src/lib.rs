//! meta-suggest - learning suggestions for image metadata editing
//!
//! Remembers the values users commit to EXIF/IPTC/XMP fields and offers them
//! back as ranked auto-complete suggestions:
//! - SQLite-backed per-field value history
//! - Frequency x recency ranking with a configurable half-life
//! - Related-field suggestions and missing-field recommendations
//! - CLI and JSON HTTP API
//!
//! # Example
//!
//! ```ignore
//! use meta_suggest::learning::{RankingConfig, SuggestionService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = SuggestionService::open("learning.db", RankingConfig::default()).await?;
//!     service.record_accepted_edit("EXIF", "Artist", "Jane Doe").await?;
//!     let suggestions = service.get_suggestions("EXIF", "Artist", 5).await?;
//!     println!("{:?}", suggestions);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod learning;
pub mod config;
pub mod server;
pub mod cli;

pub use config::Config;
pub use error::{PersistenceError, SuggestError};
pub use learning::{
    FieldKey,
    Suggestion,
    SuggestionService,
    SqliteHistoryStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Metadata Suggestion Engine", NAME, VERSION)
}
