//! Search command implementation.

use crate::ai::AiClient;
use crate::catalog::SqliteCatalog;
use crate::cli::Output;
use crate::config::Settings;
use crate::search::SearchEngine;
use anyhow::Result;
use std::sync::Arc;

/// Run a one-shot search from the command line.
pub async fn run_search(query: &str, settings: Settings) -> Result<()> {
    let store = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
    let ai = Arc::new(AiClient::from_settings(&settings)?);
    let engine = SearchEngine::new(store, ai);

    let spinner = Output::spinner("Expanding query and searching...");
    let results = engine.search(query).await;
    spinner.finish_and_clear();

    match results {
        Ok(items) => {
            if items.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", items.len()));
                println!();
                for item in &items {
                    Output::catalog_item(item);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
