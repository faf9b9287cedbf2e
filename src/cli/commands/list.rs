//! List command implementation.

use crate::catalog::{CatalogStore, SqliteCatalog};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use std::sync::Arc;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let store = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);

    match store.list_all().await {
        Ok(items) => {
            if items.is_empty() {
                Output::info("No audio files cataloged yet. Use 'lydtag watch' to start ingesting.");
            } else {
                Output::header(&format!("Cataloged Audio ({})", items.len()));
                println!();

                for item in &items {
                    Output::catalog_item(item);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list catalog: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
