//! Polling directory watcher.
//!
//! Lists the watched directory on a fixed interval and runs the pipeline on
//! paths it has not seen before. Polling keeps behavior identical across
//! filesystems that deliver unreliable change events (network mounts,
//! container volume mounts).
//!
//! Modified files are never re-processed: a path is processed once per
//! watcher lifetime, and re-writes of an existing path are ignored.

use super::{list_audio_files, Ingestor};
use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Watch `dir` for new audio files, forever.
///
/// Files already present when the watch starts are assumed handled by the
/// startup scan and are not processed again. Events are handled one at a
/// time; a slow AI call simply delays the next poll.
pub async fn watch(
    ingestor: &Ingestor,
    dir: &Path,
    extension: &str,
    poll_interval: Duration,
) -> Result<()> {
    let mut seen: HashSet<PathBuf> = list_audio_files(dir, extension)?.into_iter().collect();

    info!(
        "Watching {:?} for new .{} files (poll interval {:?})",
        dir, extension, poll_interval
    );

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let files = match list_audio_files(dir, extension) {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list {:?}: {}", dir, e);
                continue;
            }
        };

        for path in files {
            if seen.insert(path.clone()) {
                info!("New audio file detected: {:?}", path);
                if let Err(e) = ingestor.process_file(&path).await {
                    // Log and keep watching; the file is only retried if it
                    // reappears under a new path.
                    error!("Failed to ingest {:?}: {}", path, e);
                }
            }
        }
    }
}
