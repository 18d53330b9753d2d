use super::progress::StepSpinner;
use crate::output::Output;
use cloudgrab_browser::ChromeSession;
use cloudgrab_config::{Config, PathManager};
use cloudgrab_core::{DownloadResult, Downloader, Session};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

pub struct DownloadArgs {
    pub url: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub headless: bool,
    pub session_file: Option<PathBuf>,
    pub keep_open: Option<u64>,
}

impl DownloadArgs {
    /// Command-line flags override the configuration file
    fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.target.collection_url = url.clone();
        }
        if let Some(dir) = &self.download_dir {
            config.download.dir = dir.clone();
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(session_file) = &self.session_file {
            config.browser.session_file = session_file.clone();
        }
    }
}

pub async fn run_download(args: DownloadArgs, output: &Output) -> Result<()> {
    tracing::debug!("Download command started");

    let path_manager = PathManager::default();
    path_manager
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create application directories: {}", e))?;
    let config_file = path_manager.config_file();
    let mut config = Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    args.apply_to(&mut config);
    config
        .validate()
        .map_err(|e| eyre!("Configuration validation failed: {}", e))?;

    let spinner = StepSpinner::new(output.is_human() && !output.is_quiet());
    spinner.set_message("Launching browser...");
    let mut session = ChromeSession::launch(&config)
        .await
        .map_err(|e| eyre!("Failed to start browser: {}", e))?;

    let outcome = download_with_session(&session, &config, &spinner).await;
    spinner.finish();

    if let Some(secs) = args.keep_open {
        output.info(format!("Keeping browser open for {} seconds...", secs));
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
    if let Err(e) = session.shutdown().await {
        tracing::warn!("Browser shutdown failed: {}", e);
    }

    let result = outcome?;
    report(&result, output);
    match result {
        DownloadResult::Done(_) => Ok(()),
        DownloadResult::Failed(failure) => Err(eyre!("Download {}", failure)),
    }
}

async fn download_with_session(session: &ChromeSession, config: &Config, spinner: &StepSpinner) -> Result<DownloadResult> {
    spinner.set_message("Loading login session...");
    session
        .load_session_state(&config.browser.session_file, &config.target.collection_url)
        .await
        .map_err(|e| eyre!("Failed to load session: {}", e))?;

    let page = session
        .new_page()
        .await
        .map_err(|e| eyre!("{}", e))?;
    let context = session.context().map_err(|e| eyre!("{}", e))?;

    spinner.set_message("Downloading latest exported video...");
    let downloader = Downloader::new(config);
    Ok(downloader
        .download_latest_video(Session::new(&page, &context))
        .await)
}

fn report(result: &DownloadResult, output: &Output) {
    if !output.is_human() {
        output.json(&serde_json::to_value(result).unwrap_or_else(|e| json!({ "error": e.to_string() })));
        return;
    }

    match result {
        DownloadResult::Done(video) => {
            output.success(format!("Video saved to: {}", video.path.display()));
            output.info(format!(
                "  Size: {:.2} MB",
                video.size_bytes as f64 / (1024.0 * 1024.0)
            ));
            if video.filename_fallback {
                output.warn("Page title was unusable, a timestamped filename was used");
            }
        }
        DownloadResult::Failed(failure) => {
            output.error(format!("Download {}", failure));
            let listing = failure.error.diagnostics();
            if !listing.is_empty() {
                output.info("Files in download directory:");
                for name in listing {
                    output.info(format!("  - {}", name));
                }
            }
        }
    }
}
