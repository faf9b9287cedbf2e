//! Ingest pipeline: convert a detected audio file into a stored catalog
//! entry.
//!
//! Every step degrades independently: unreadable embedded tags become an
//! empty map, a failed AI call becomes an empty generated set, and only a
//! persistence failure aborts the file (logged and skipped by the callers).

mod watcher;

pub use watcher::watch;

use crate::ai::AiClient;
use crate::catalog::{CatalogItem, CatalogStore};
use crate::error::{LydtagError, Result};
use crate::tags::{merge_tags, read_embedded_tags, GeneratedTags};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use walkdir::WalkDir;

/// The per-file processing pipeline, shared by the startup scan and the
/// live watcher.
pub struct Ingestor {
    store: Arc<dyn CatalogStore>,
    ai: Arc<AiClient>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn CatalogStore>, ai: Arc<AiClient>) -> Self {
        Self { store, ai }
    }

    /// Run one file through the pipeline: embedded tags, AI tags, merge,
    /// upsert. Returns the stored item; only a persistence failure is an
    /// error.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_file(&self, path: &Path) -> Result<CatalogItem> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                LydtagError::InvalidInput(format!("path has no usable filename: {:?}", path))
            })?;

        info!("Processing {}", filename);

        let embedded = read_embedded_tags(path);

        let generated = match self.ai.generate_tags(filename, path, &embedded).await {
            Ok(tags) => {
                info!("Generated tags for {}: {:?}", filename, tags);
                tags
            }
            Err(e) => {
                error!("Failed to generate tags for {}: {}", filename, e);
                GeneratedTags::default()
            }
        };

        let fields = merge_tags(&generated, &embedded);
        let path_str = path.to_string_lossy();

        let item = self.store.upsert(&path_str, filename, &fields).await?;
        info!("Saved {} to catalog", filename);

        Ok(item)
    }

    /// One-time backward scan of the watched directory at startup.
    ///
    /// Processes every existing supported file sequentially with a fixed
    /// inter-item delay to respect remote AI rate limits. Per-file failures
    /// are logged and skipped. Returns the number of files stored.
    ///
    /// `progress` is bumped once per handled file so a caller can drive a
    /// progress display while the scan runs.
    #[instrument(skip(self, progress), fields(dir = %dir.display()))]
    pub async fn scan_existing(
        &self,
        dir: &Path,
        extension: &str,
        delay: Duration,
        progress: Option<Arc<AtomicU64>>,
    ) -> Result<usize> {
        let files = list_audio_files(dir, extension)?;
        info!("Scanning {:?}: {} existing files", dir, files.len());

        let mut stored = 0;
        for (index, path) in files.iter().enumerate() {
            match self.process_file(path).await {
                Ok(_) => stored += 1,
                Err(e) => error!("Failed to ingest {:?}: {}", path, e),
            }

            if let Some(counter) = &progress {
                counter.fetch_add(1, Ordering::Relaxed);
            }

            if index + 1 < files.len() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(stored)
    }
}

/// List the supported audio files directly inside `dir`, sorted by path.
///
/// Non-recursive, hidden files skipped, extension matched case-insensitively.
pub fn list_audio_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| !name.starts_with('.'))
                .unwrap_or(false)
        })
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.to_ascii_lowercase() == extension)
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::{client, CannedBackend, FailingBackend};
    use crate::catalog::SqliteCatalog;
    use std::fs;
    use tempfile::tempdir;

    fn ingestor_with(store: Arc<SqliteCatalog>, ai: AiClient) -> Ingestor {
        Ingestor::new(store, Arc::new(ai))
    }

    #[test]
    fn test_list_audio_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.MP3"), b"x").unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join(".hidden.mp3"), b"x").unwrap();

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("nested.mp3"), b"x").unwrap();

        let files = list_audio_files(dir.path(), "mp3").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();

        assert_eq!(names, vec!["a.mp3", "b.MP3"]);
    }

    #[tokio::test]
    async fn test_scan_stores_every_file_even_when_ai_fails() {
        let dir = tempdir().unwrap();
        for name in ["one.mp3", "two.mp3", "three.mp3"] {
            fs::write(dir.path().join(name), b"not a real mp3").unwrap();
        }

        let store = Arc::new(SqliteCatalog::in_memory().unwrap());
        let backend = Arc::new(FailingBackend::new(false));
        let ingestor = ingestor_with(store.clone(), client(backend.clone(), backend));

        let stored = ingestor
            .scan_existing(dir.path(), "mp3", Duration::ZERO, None)
            .await
            .unwrap();

        assert_eq!(stored, 3);
        assert_eq!(store.count().await.unwrap(), 3);

        // AI failed and the files carry no readable tags: embedded-only rows.
        for item in store.list_all().await.unwrap() {
            assert!(item.fields.title.is_none());
            assert!(item.fields.comment.is_none());
        }
    }

    #[tokio::test]
    async fn test_scan_reports_progress_per_file() {
        let dir = tempdir().unwrap();
        for name in ["one.mp3", "two.mp3", "three.mp3"] {
            fs::write(dir.path().join(name), b"not a real mp3").unwrap();
        }

        let store = Arc::new(SqliteCatalog::in_memory().unwrap());
        let backend = Arc::new(FailingBackend::new(false));
        let ingestor = ingestor_with(store, client(backend.clone(), backend));

        let progress = Arc::new(AtomicU64::new(0));
        ingestor
            .scan_existing(dir.path(), "mp3", Duration::ZERO, Some(progress.clone()))
            .await
            .unwrap();

        // Counted even when the AI call fails: the file was still handled.
        assert_eq!(progress.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_process_file_stores_generated_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rain.mp3");
        fs::write(&path, b"not a real mp3").unwrap();

        let store = Arc::new(SqliteCatalog::in_memory().unwrap());
        let backend = Arc::new(CannedBackend::new(
            GeneratedTags {
                title: Some("Heavy Rain".to_string()),
                artist: Some("Nature".to_string()),
                comment: Some("rain on a tin roof".to_string()),
                ..GeneratedTags::default()
            },
            vec![],
        ));
        let ingestor = ingestor_with(store.clone(), client(backend.clone(), backend));

        let item = ingestor.process_file(&path).await.unwrap();
        assert_eq!(item.filename, "rain.mp3");
        assert_eq!(item.fields.title.as_deref(), Some("Heavy Rain"));
        assert_eq!(item.fields.artist.as_deref(), Some("Nature"));
        assert_eq!(item.fields.comment.as_deref(), Some("rain on a tin roof"));
    }

    #[tokio::test]
    async fn test_reingest_updates_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rain.mp3");
        fs::write(&path, b"not a real mp3").unwrap();

        let store = Arc::new(SqliteCatalog::in_memory().unwrap());

        let first = Arc::new(CannedBackend::new(
            GeneratedTags {
                artist: Some("Nature".to_string()),
                ..GeneratedTags::default()
            },
            vec![],
        ));
        ingestor_with(store.clone(), client(first.clone(), first))
            .process_file(&path)
            .await
            .unwrap();

        let second = Arc::new(CannedBackend::new(
            GeneratedTags {
                artist: Some("Weather".to_string()),
                ..GeneratedTags::default()
            },
            vec![],
        ));
        ingestor_with(store.clone(), client(second.clone(), second))
            .process_file(&path)
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let item = store.list_all().await.unwrap().remove(0);
        assert_eq!(item.fields.artist.as_deref(), Some("Weather"));
    }
}
