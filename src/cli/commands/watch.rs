//! Watch command implementation.

use crate::ai::AiClient;
use crate::catalog::SqliteCatalog;
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::{list_audio_files, watch, Ingestor};
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Run the watcher: startup scan, then poll for new files forever.
pub async fn run_watch(dir: Option<String>, skip_scan: bool, settings: Settings) -> Result<()> {
    let music_dir = match dir {
        Some(d) => Settings::expand_path(&d),
        None => settings.music_dir(),
    };

    if !music_dir.is_dir() {
        anyhow::bail!("music directory does not exist: {:?}", music_dir);
    }

    let store = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
    let ai = Arc::new(AiClient::from_settings(&settings)?);
    let ingestor = Ingestor::new(store, ai);

    let extension = settings.library.extension.clone();

    Output::header("Lydtag Watcher");
    println!();
    Output::kv("Directory", &music_dir.display().to_string());
    Output::kv("Extension", &format!(".{}", extension));
    Output::kv("Catalog", &settings.sqlite_path().display().to_string());
    println!();

    if !skip_scan {
        let total = list_audio_files(&music_dir, &extension)?.len() as u64;
        let pb = Output::progress_bar(total, "Scanning existing files");
        let progress = Arc::new(AtomicU64::new(0));

        // The scan owns the loop, so a side task mirrors its counter onto
        // the bar while it runs.
        let ticker = {
            let pb = pb.clone();
            let progress = progress.clone();
            tokio::spawn(async move {
                loop {
                    pb.set_position(progress.load(Ordering::Relaxed));
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            })
        };

        let scan = ingestor
            .scan_existing(
                &music_dir,
                &extension,
                Duration::from_secs(settings.library.scan_delay_seconds),
                Some(progress),
            )
            .await;

        ticker.abort();
        pb.finish_and_clear();

        let stored = scan?;
        Output::success(&format!("Startup scan complete: {} files cataloged", stored));
    }

    Output::info("Watching for new files. Press Ctrl+C to stop.");

    watch(
        &ingestor,
        &music_dir,
        &extension,
        Duration::from_secs(settings.library.poll_interval_seconds),
    )
    .await?;

    Ok(())
}
