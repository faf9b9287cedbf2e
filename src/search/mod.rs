//! Query expansion and catalog search.
//!
//! A free-text query is expanded into keywords by the AI client (degrading
//! to a whitespace split), then matched as case-insensitive substrings
//! against the catalog's text fields. There is no ranking or scoring; the
//! result order is whatever the store returns and should be treated as
//! arbitrary.

use crate::ai::AiClient;
use crate::catalog::{matches_any, CatalogItem, CatalogStore};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Search over the catalog with AI-assisted query expansion.
pub struct SearchEngine {
    store: Arc<dyn CatalogStore>,
    ai: Arc<AiClient>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn CatalogStore>, ai: Arc<AiClient>) -> Self {
        Self { store, ai }
    }

    /// Expand `query` into keywords and return every item where at least
    /// one keyword matches at least one text field. Each stored item is
    /// visited exactly once, so the result carries no duplicates however
    /// many keywords or fields match.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<CatalogItem>> {
        let keywords = self.ai.expand_query(query).await;
        info!("Expanded keywords for '{}': {:?}", query, keywords);

        let items = self.store.list_all().await?;
        let results: Vec<CatalogItem> = items
            .into_iter()
            .filter(|item| matches_any(item, &keywords))
            .collect();

        debug!("{} of the catalog items matched", results.len());
        Ok(results)
    }
}

/// Build the playback URL for an item from the serving origin and the
/// stored filename. Audio files are mounted under the fixed `/music` prefix.
pub fn playback_url(origin: &str, filename: &str) -> String {
    format!("{}/music/{}", origin.trim_end_matches('/'), filename)
}
