use cloudgrab_config::Timeouts;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DownloadError, SessionError};
use crate::resolve::first_visible;
use crate::selectors::SelectorStrategy;
use crate::session::{DownloadWatch, ElementHandle, PageHandle, TransferHandle};

/// A transfer that landed on disk with a non-zero size
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub suggested_filename: String,
}

/// Trigger the action control and save the resulting transfer as `download_dir/filename`.
pub async fn capture_download<P: PageHandle>(
    page: &P,
    strategy: &SelectorStrategy,
    match_limit: usize,
    download_dir: &Path,
    filename: &str,
    timeouts: &Timeouts,
) -> Result<SavedFile, DownloadError> {
    info!("Looking for download button...");
    let Some((position, control)) = first_visible(page, strategy, Some(match_limit)).await else {
        return Err(DownloadError::Discovery {
            what: "download control",
        });
    };
    info!("Found download button via selector {}", position.query_index + 1);

    let watch = page.watch_download().await?;
    control.click(timeouts.action_click()).await?;
    drop(control);

    let transfer = watch.wait(timeouts.download_event()).await.map_err(|e| match e {
        SessionError::Timeout(timeout, _) => DownloadError::SpawnTimeout {
            what: "download event",
            timeout,
        },
        other => DownloadError::Session(other),
    })?;
    let suggested_filename = transfer.suggested_filename().to_string();
    info!("Download started: {}", suggested_filename);

    tokio::fs::create_dir_all(download_dir)
        .await
        .map_err(SessionError::from)?;
    let destination = download_dir.join(filename);
    info!("Saving to: {}", destination.display());

    let cause = match transfer.save_as(&destination).await {
        Ok(()) => None,
        Err(e) => {
            warn!("Save reported an error: {}", e);
            Some(e.to_string())
        }
    };

    let size_bytes = verify_saved_file(&destination, cause)?;
    info!(
        "Download completed: {} ({:.2} MB)",
        destination.display(),
        size_bytes as f64 / (1024.0 * 1024.0)
    );

    Ok(SavedFile {
        path: destination,
        size_bytes,
        suggested_filename,
    })
}

/// Size of the file at `path`, or a persistence error listing what the directory does contain.
pub fn verify_saved_file(path: &Path, cause: Option<String>) -> Result<u64, DownloadError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        Ok(meta) => {
            debug!("{} exists but is {} bytes", path.display(), meta.len());
            Err(persistence_error(path, cause))
        }
        Err(e) => {
            debug!("{} not readable: {}", path.display(), e);
            Err(persistence_error(path, cause))
        }
    }
}

fn persistence_error(path: &Path, cause: Option<String>) -> DownloadError {
    let directory_listing = path.parent().map(list_directory).unwrap_or_default();
    warn!("Download file not found or empty, directory contains: {:?}", directory_listing);
    DownloadError::Persistence {
        path: path.to_path_buf(),
        cause,
        directory_listing,
    }
}

fn list_directory(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
