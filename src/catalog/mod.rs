//! Catalog store abstraction.
//!
//! The catalog is a flat table of audio items keyed by file path. Items are
//! created on first sight of a file, overwritten on re-ingestion, and never
//! deleted by this system.

mod sqlite;

pub use sqlite::SqliteCatalog;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The six descriptive fields carried by every catalog item.
///
/// The field names follow ID3 conventions, but the AI prompt repurposes them:
/// `artist` holds the sound category, `album` the sub-category or library,
/// `genre` the mood, and `comment` a free-text description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
}

/// One row of the catalog: a single audio file and its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Surrogate identity for external reference.
    pub id: Uuid,
    /// Unique file path; the source of truth for identity and dedup.
    pub path: String,
    /// Basename of the file, used to build playback URLs.
    pub filename: String,
    pub fields: TagFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistent store of catalog items.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or update the item for `path`, overwriting all six fields.
    ///
    /// At most one item exists per unique path; re-ingestion of the same
    /// path updates in place and bumps `updated_at`.
    async fn upsert(&self, path: &str, filename: &str, fields: &TagFields) -> Result<CatalogItem>;

    /// Look up an item by its unique path.
    async fn get_by_path(&self, path: &str) -> Result<Option<CatalogItem>>;

    /// All items, in insertion order.
    async fn list_all(&self) -> Result<Vec<CatalogItem>>;

    /// Number of items in the catalog.
    async fn count(&self) -> Result<usize>;
}

/// Whether any keyword is a case-insensitive substring of any of the item's
/// six text fields (filename, title, artist, album, genre, comment).
///
/// The year field is numeric-ish display data and is not searched.
pub fn matches_any(item: &CatalogItem, keywords: &[String]) -> bool {
    let haystacks = [
        Some(item.filename.as_str()),
        item.fields.title.as_deref(),
        item.fields.artist.as_deref(),
        item.fields.album.as_deref(),
        item.fields.genre.as_deref(),
        item.fields.comment.as_deref(),
    ];

    keywords.iter().any(|kw| {
        let kw = kw.to_lowercase();
        !kw.is_empty()
            && haystacks
                .iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&kw))
    })
}
