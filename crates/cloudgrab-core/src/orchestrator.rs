//! End-to-end "latest exported video" download against a borrowed session.

use cloudgrab_config::{Config, TargetConfig, Timeouts};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::filename::derive_filename_now;
use crate::poll::{PollOutcome, Poller};
use crate::selectors::Strategies;
use crate::session::{BrowsingContext, PageHandle, Session};
use crate::steps::{
    capture_download, dismiss_popups, locate_section, open_video_candidate, wait_for_action_control,
};

pub const DEBUG_SCREENSHOT_NAME: &str = "debug_before_click.png";

/// Workflow position. A failure is reported with the stage it was trying to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Navigated,
    PopupsClosed,
    SectionLocated,
    VideoOpened,
    Ready,
    ReadyTimedOut,
    Downloaded,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Navigated => "navigated",
            Stage::PopupsClosed => "popups closed",
            Stage::SectionLocated => "section located",
            Stage::VideoOpened => "video opened",
            Stage::Ready => "ready",
            Stage::ReadyTimedOut => "ready (timed out)",
            Stage::Downloaded => "downloaded",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadedVideo {
    /// Absolute path of the saved file
    pub path: PathBuf,
    pub size_bytes: u64,
    /// True when the title could not be used and a timestamp name was chosen
    pub filename_fallback: bool,
    pub suggested_filename: String,
    pub detail_url: Option<String>,
    /// `Ready`, or `ReadyTimedOut` when the action control never showed up during polling
    pub readiness: Stage,
}

#[derive(Debug, Serialize)]
pub struct DownloadFailure {
    pub stage: Stage,
    #[serde(serialize_with = "display_string")]
    pub error: DownloadError,
}

impl DownloadFailure {
    fn at(stage: Stage, error: DownloadError) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed at {}: {}", self.stage, self.error)
    }
}

fn display_string<S: Serializer>(error: &DownloadError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadResult {
    Done(DownloadedVideo),
    Failed(DownloadFailure),
}

impl DownloadResult {
    pub fn is_done(&self) -> bool {
        matches!(self, DownloadResult::Done(_))
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            DownloadResult::Done(_) => None,
            DownloadResult::Failed(failure) => Some(failure.stage),
        }
    }
}

/// Runs the workflow. Holds configuration only, the session is borrowed per call.
pub struct Downloader {
    target: TargetConfig,
    download_dir: PathBuf,
    candidate_match_limit: usize,
    debug_screenshot: bool,
    timeouts: Timeouts,
    strategies: Strategies,
    readiness: Poller,
}

impl Downloader {
    pub fn new(config: &Config) -> Self {
        let timeouts = config.timeouts.clone();
        let readiness = Poller::new(
            "download control",
            timeouts.readiness_ticks,
            timeouts.readiness_tick(),
        );
        Self {
            strategies: Strategies::from_target(&config.target),
            target: config.target.clone(),
            download_dir: config.download.dir.clone(),
            candidate_match_limit: config.download.candidate_match_limit,
            debug_screenshot: config.download.debug_screenshot,
            timeouts,
            readiness,
        }
    }

    /// Download the most recent exported video. Never returns an error: every failure becomes
    /// [`DownloadResult::Failed`] carrying the stage it happened at.
    pub async fn download_latest_video<C: BrowsingContext>(&self, session: Session<'_, C>) -> DownloadResult {
        match self.run(session).await {
            Ok(video) => {
                info!("Downloaded {} ({} bytes)", video.path.display(), video.size_bytes);
                DownloadResult::Done(video)
            }
            Err(failure) => {
                warn!("Download {}", failure);
                for entry in failure.error.diagnostics() {
                    info!("  - {}", entry);
                }
                DownloadResult::Failed(failure)
            }
        }
    }

    async fn run<C: BrowsingContext>(&self, session: Session<'_, C>) -> Result<DownloadedVideo, DownloadFailure> {
        let page = session.page;
        debug!("Stage: {}", Stage::Init);

        self.navigate(page)
            .await
            .map_err(|e| DownloadFailure::at(Stage::Navigated, e))?;
        debug!("Stage: {}", Stage::Navigated);

        dismiss_popups(page, &self.strategies.popup_close, &self.timeouts).await;
        debug!("Stage: {}", Stage::PopupsClosed);

        let location = locate_section(page, &self.strategies.section_heading, &self.timeouts).await;
        sleep(self.timeouts.candidate_settle()).await;
        debug!("Stage: {} ({:?})", Stage::SectionLocated, location);

        if self.debug_screenshot {
            self.save_debug_screenshot(page).await;
        }

        let detail = open_video_candidate(
            session,
            &self.strategies.video_candidate,
            self.candidate_match_limit,
            &self.timeouts,
        )
        .await
        .map_err(|e| DownloadFailure::at(Stage::VideoOpened, e))?;
        debug!("Stage: {}", Stage::VideoOpened);

        let result = self.download_from_detail(&detail).await;

        if let Err(e) = detail.close().await {
            warn!("Failed to close detail page: {}", e);
        }

        result
    }

    async fn navigate<P: PageHandle>(&self, page: &P) -> Result<(), DownloadError> {
        info!("Navigating to: {}", self.target.collection_url);
        page.navigate(&self.target.collection_url, self.timeouts.navigation())
            .await?;
        sleep(self.timeouts.post_navigation_settle()).await;

        let current = page.current_url().await?;
        info!("Current URL: {}", current);

        let expected = self.target.expected_url_segment.to_lowercase();
        if !current.to_lowercase().contains(&expected) {
            return Err(DownloadError::Navigation {
                expected: self.target.expected_url_segment.clone(),
                actual: current,
            });
        }
        Ok(())
    }

    async fn save_debug_screenshot<P: PageHandle>(&self, page: &P) {
        if let Err(e) = tokio::fs::create_dir_all(&self.download_dir).await {
            debug!("Could not create {}: {}", self.download_dir.display(), e);
            return;
        }
        let path = self.download_dir.join(DEBUG_SCREENSHOT_NAME);
        match page.screenshot(&path).await {
            Ok(()) => info!("Debug screenshot saved: {}", path.display()),
            Err(e) => debug!("Debug screenshot failed: {}", e),
        }
    }

    async fn download_from_detail<P: PageHandle>(&self, detail: &P) -> Result<DownloadedVideo, DownloadFailure> {
        let detail_url = detail.current_url().await.ok();
        if let Some(url) = &detail_url {
            info!("Detail page URL: {}", url);
        }

        let readiness = match wait_for_action_control(detail, &self.strategies.action_button, &self.readiness).await {
            PollOutcome::Ready { .. } => Stage::Ready,
            PollOutcome::TimedOut { .. } => Stage::ReadyTimedOut,
        };
        debug!("Stage: {}", readiness);
        sleep(self.timeouts.detail_settle()).await;

        let title = detail.title().await;
        if let Ok(title) = &title {
            info!("Page title: {}", title);
        }
        let filename = derive_filename_now(title, &self.target.fallback_filename_prefix);
        if filename.fallback {
            warn!("Page title unusable, saving as {}", filename.name);
        } else {
            info!("Will save as: {}", filename.name);
        }

        let saved = capture_download(
            detail,
            &self.strategies.action_button,
            self.candidate_match_limit,
            &self.download_dir,
            &filename.name,
            &self.timeouts,
        )
        .await
        .map_err(|e| DownloadFailure::at(Stage::Downloaded, e))?;
        debug!("Stage: {}", Stage::Downloaded);

        let path = std::fs::canonicalize(&saved.path).unwrap_or(saved.path);
        debug!("Stage: {}", Stage::Done);
        Ok(DownloadedVideo {
            path,
            size_bytes: saved.size_bytes,
            filename_fallback: filename.fallback,
            suggested_filename: saved.suggested_filename,
            detail_url,
            readiness,
        })
    }
}
