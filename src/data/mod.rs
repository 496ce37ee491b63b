//! Data ingestion, storage and model caching
//!
//! SQLite game store, CSV feed, and the file-backed model cache.

pub mod cache;
pub mod database;
pub mod feed;
pub mod source;

pub use cache::{FileCache, ModelCache};
pub use database::Database;
pub use feed::CsvFeed;
pub use source::{GameSource, StoredGames};
