//! File transfers started by page clicks.
//!
//! Downloads land in a staging directory under their CDP guid. `save_as` waits for the browser to
//! report completion and moves the staged file into place.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin, SetDownloadBehaviorBehavior,
    SetDownloadBehaviorParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Browser;
use cloudgrab_core::{DownloadWatch, SessionError, TransferHandle};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::browser_error;

/// Where downloads are staged and how long a transfer may run
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub staging_dir: PathBuf,
    pub complete_timeout: Duration,
}

/// Route every download into the staging directory and turn on progress events
pub async fn enable_downloads(browser: &Browser, settings: &DownloadSettings) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&settings.staging_dir).await?;

    let params = SetDownloadBehaviorParams {
        behavior: SetDownloadBehaviorBehavior::AllowAndName,
        browser_context_id: None,
        download_path: Some(settings.staging_dir.to_string_lossy().to_string()),
        events_enabled: Some(true),
    };
    browser
        .execute(params)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to configure download behavior: {}", e))?;

    info!("Download staging directory: {}", settings.staging_dir.display());
    Ok(())
}

pub struct ChromeDownloadWatch {
    begins: EventStream<EventDownloadWillBegin>,
    progress: EventStream<EventDownloadProgress>,
    settings: DownloadSettings,
}

impl ChromeDownloadWatch {
    /// Subscribe to both event kinds now, so a fast transfer cannot finish before we listen
    pub async fn arm(browser: &Browser, settings: DownloadSettings) -> Result<Self, SessionError> {
        let begins = browser
            .event_listener::<EventDownloadWillBegin>()
            .await
            .map_err(browser_error)?;
        let progress = browser
            .event_listener::<EventDownloadProgress>()
            .await
            .map_err(browser_error)?;
        Ok(Self {
            begins,
            progress,
            settings,
        })
    }
}

#[async_trait]
impl DownloadWatch for ChromeDownloadWatch {
    type Transfer = ChromeTransfer;

    async fn wait(mut self, limit: Duration) -> Result<ChromeTransfer, SessionError> {
        let event = timeout(limit, self.begins.next())
            .await
            .map_err(|_| SessionError::Timeout(limit, "download"))?
            .ok_or_else(|| SessionError::Browser("download event stream closed".to_string()))?;

        debug!("Download {} started from {}", event.guid, event.url);
        Ok(ChromeTransfer {
            guid: event.guid.clone(),
            suggested_filename: event.suggested_filename.clone(),
            progress: self.progress,
            settings: self.settings,
        })
    }
}

pub struct ChromeTransfer {
    guid: String,
    suggested_filename: String,
    progress: EventStream<EventDownloadProgress>,
    settings: DownloadSettings,
}

impl ChromeTransfer {
    async fn wait_for_completion(&mut self) -> Result<(), SessionError> {
        let mut last_logged_mb = 0u64;
        while let Some(event) = self.progress.next().await {
            if event.guid != self.guid {
                continue;
            }
            match event.state {
                DownloadProgressState::Completed => return Ok(()),
                DownloadProgressState::Canceled => {
                    return Err(SessionError::Browser("download was canceled".to_string()))
                }
                DownloadProgressState::InProgress => {
                    let mb = (event.received_bytes / (1024.0 * 1024.0)) as u64;
                    if mb >= last_logged_mb + 10 {
                        debug!("Downloaded {} MB of {:.0} MB", mb, event.total_bytes / (1024.0 * 1024.0));
                        last_logged_mb = mb;
                    }
                }
            }
        }
        Err(SessionError::Browser("download progress stream closed".to_string()))
    }
}

#[async_trait]
impl TransferHandle for ChromeTransfer {
    fn suggested_filename(&self) -> &str {
        &self.suggested_filename
    }

    async fn save_as(mut self, path: &Path) -> Result<(), SessionError> {
        let limit = self.settings.complete_timeout;
        timeout(limit, self.wait_for_completion())
            .await
            .map_err(|_| SessionError::Timeout(limit, "download to finish"))??;

        let staged = self.settings.staging_dir.join(&self.guid);
        move_file(&staged, path).await?;
        debug!("Moved {} to {}", staged.display(), path.display());
        Ok(())
    }
}

/// Rename, falling back to copy and delete when the staging directory is on another filesystem
async fn move_file(from: &Path, to: &Path) -> Result<(), SessionError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
