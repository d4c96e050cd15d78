use std::{io::ErrorKind, path::Path, time::Duration};

use tracing::{debug, info, warn};

use crate::state::AppState;

const MAINTENANCE_INTERVAL_SECONDS: u64 = 60;

/// Periodically drops expired short links and, when a retention is
/// configured, stored files older than it.
pub fn spawn_maintenance(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            run_maintenance(&state).await;
        }
    })
}

pub async fn run_maintenance(state: &AppState) {
    let pruned = state.links.prune_expired().await;
    if pruned > 0 {
        debug!("pruned {pruned} expired short link(s)");
    }

    let removed = cleanup_stale_files(
        state.downloader.download_dir(),
        state.config.file_retention_seconds,
    )
    .await;
    if removed > 0 {
        info!("removed {removed} stored file(s) past retention");
    }
}

/// Deletes regular files in `download_dir` last modified more than
/// `older_than_secs` ago. `0` disables the sweep.
pub async fn cleanup_stale_files(download_dir: &Path, older_than_secs: u64) -> usize {
    if older_than_secs == 0 {
        return 0;
    }

    let mut entries = match tokio::fs::read_dir(download_dir).await {
        Ok(entries) => entries,
        Err(error) => {
            if error.kind() != ErrorKind::NotFound {
                warn!("could not open downloads directory for cleanup: {error}");
            }
            return 0;
        }
    };

    let max_age = Duration::from_secs(older_than_secs);
    let now = std::time::SystemTime::now();
    let mut removed = 0;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(error) => {
                warn!("could not iterate downloads directory for cleanup: {error}");
                break;
            }
        };

        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!("could not read metadata of {:?}: {error}", path);
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified_at| now.duration_since(modified_at).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => warn!("could not delete stored file {:?}: {error}", path),
        }
    }

    removed
}
