use anyhow::{anyhow, Result};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig as CdpBrowserConfig};
use cloudgrab_config::{BrowserConfig, Config};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use which::which;

use crate::context::ChromeContext;
use crate::download::{enable_downloads, DownloadSettings};
use crate::page::ChromePage;
use crate::state::{site_root, SessionState};

const COOKIE_SETTLE: Duration = Duration::from_secs(2);

/// A launched Chromium with its CDP handler task
pub struct ChromeSession {
    browser: Option<Arc<Browser>>,
    handler_task: Option<tokio::task::JoinHandle<()>>,
    downloads: DownloadSettings,
    /// Removed on shutdown, or on drop if shutdown never ran
    staging: Option<TempDir>,
}

impl ChromeSession {
    /// Launch the browser described by `config.browser` and route downloads through a staging
    /// directory.
    pub async fn launch(config: &Config) -> Result<Self> {
        let settings = &config.browser;
        tokio::fs::create_dir_all(&settings.user_data_dir).await?;

        let chrome_path = match &settings.chrome_executable {
            Some(path) => Some(path.clone()),
            None => Self::find_system_chromium(),
        };
        let chrome_path = match chrome_path {
            Some(path) => path,
            None => Self::fetch_chromium(&settings.user_data_dir).await?,
        };
        info!("Using Chromium at {}", chrome_path.display());
        let staging = create_staging_dir()?;

        let cdp_config = Self::build_browser_config(&chrome_path, settings)?;
        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        let handler_task = tokio::spawn(async move {
            let mut error_count = 0;
            const MAX_ERRORS: usize = 10;

            while let Some(h) = handler.next().await {
                match h {
                    Ok(_) => error_count = 0,
                    Err(e) => {
                        error_count += 1;
                        warn!("Browser handler error (count: {}/{}): {:?}", error_count, MAX_ERRORS, e);
                        if error_count >= MAX_ERRORS {
                            error!("Browser handler received {} consecutive errors. Browser process may have crashed.", error_count);
                            break;
                        }
                    }
                }
            }
            debug!("Browser handler task ended");
        });

        let downloads = DownloadSettings {
            staging_dir: staging.path().to_path_buf(),
            complete_timeout: config.timeouts.download_complete(),
        };
        enable_downloads(&browser, &downloads).await?;

        Ok(Self {
            browser: Some(Arc::new(browser)),
            handler_task: Some(handler_task),
            downloads,
            staging: Some(staging),
        })
    }

    fn browser(&self) -> Result<&Arc<Browser>> {
        self.browser
            .as_ref()
            .ok_or_else(|| anyhow!("Browser has been shut down"))
    }

    /// Install cookies from the session file, visiting the collection's site first
    pub async fn load_session_state(&self, session_file: &Path, collection_url: &str) -> Result<usize> {
        let state = SessionState::load(session_file)?;
        let root = site_root(collection_url)
            .ok_or_else(|| anyhow!("Cannot derive site root from {}", collection_url))?;

        let page = self
            .browser()?
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to open page for cookies: {}", e))?;
        let result = state.apply(&page, &root, COOKIE_SETTLE).await;
        if let Err(e) = page.close().await {
            warn!("Failed to close cookie page: {}", e);
        }
        result
    }

    pub async fn new_page(&self) -> Result<ChromePage> {
        let browser = self.browser()?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create new page: {}", e))?;
        Ok(ChromePage::new(page, browser.clone(), self.downloads.clone()))
    }

    pub fn context(&self) -> Result<ChromeContext> {
        Ok(ChromeContext::new(self.browser()?.clone(), self.downloads.clone()))
    }

    /// Close the browser and remove the staging directory
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(browser) = self.browser.take() {
            info!("Shutting down browser instance");
            match Arc::try_unwrap(browser) {
                Ok(mut browser) => {
                    if let Err(e) = browser.close().await {
                        warn!("Failed to close browser: {}", e);
                    }
                    let _ = browser.wait().await;
                }
                Err(_) => debug!("Browser still referenced by open pages, dropping handle"),
            }
        }

        if let Some(handler_task) = self.handler_task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), handler_task).await;
        }

        if let Some(staging) = self.staging.take() {
            if let Err(e) = staging.close() {
                debug!("Failed to remove {}: {}", self.downloads.staging_dir.display(), e);
            }
        }
        Ok(())
    }

    async fn fetch_chromium(user_data_dir: &Path) -> Result<PathBuf> {
        info!("No system Chromium found, downloading via BrowserFetcher...");
        let fetcher_path = user_data_dir
            .parent()
            .ok_or_else(|| anyhow!("Could not determine parent directory"))?
            .join("chromium_downloads");
        tokio::fs::create_dir_all(&fetcher_path).await?;

        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&fetcher_path)
                .build()
                .map_err(|e| anyhow!("Failed to create BrowserFetcherOptions: {}", e))?,
        );
        let fetched = fetcher
            .fetch()
            .await
            .map_err(|e| anyhow!("Failed to fetch Chromium: {}", e))?;

        Self::remove_macos_quarantine(&fetched.executable_path);
        info!("Chromium downloaded to: {}", fetched.executable_path.display());
        Ok(fetched.executable_path)
    }

    fn is_docker() -> bool {
        Path::new("/.dockerenv").exists()
            || std::fs::read_to_string("/proc/self/cgroup")
                .map(|s| s.contains("docker") || s.contains("containerd"))
                .unwrap_or(false)
    }

    #[cfg(target_os = "macos")]
    fn remove_macos_quarantine(path: &Path) {
        use std::process::Command;
        let _ = Command::new("xattr")
            .arg("-d")
            .arg("com.apple.quarantine")
            .arg(path)
            .output();
    }

    #[cfg(not(target_os = "macos"))]
    fn remove_macos_quarantine(_path: &Path) {}

    fn find_system_chromium() -> Option<PathBuf> {
        let mut candidates: Vec<&str> = Vec::new();
        if cfg!(target_os = "macos") {
            candidates.extend([
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/opt/homebrew/bin/chromium",
            ]);
        }
        candidates.extend([
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
            "/opt/chromium/chromium",
        ]);

        if let Some(found) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
            Self::remove_macos_quarantine(&found);
            return Some(found);
        }

        which("chromium")
            .or_else(|_| which("chromium-browser"))
            .or_else(|_| which("google-chrome"))
            .ok()
    }

    fn build_browser_config(chrome_path: &Path, settings: &BrowserConfig) -> Result<CdpBrowserConfig> {
        let is_docker = Self::is_docker();
        let is_macos = cfg!(target_os = "macos");

        let mut builder = CdpBrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(settings.window_width, settings.window_height)
            .viewport(Viewport {
                width: settings.window_width,
                height: settings.window_height,
                ..Viewport::default()
            });

        // Containers have no display
        if !settings.headless && !is_docker {
            builder = builder.with_head();
        } else if is_docker {
            info!("Running in a container, forcing headless mode");
        }

        if is_docker || !is_macos {
            builder = builder.arg("--no-sandbox").arg("--disable-dev-shm-usage");
        }
        if is_docker {
            builder = builder
                .arg("--disable-gpu")
                .arg("--disable-crash-reporter")
                .arg("--disable-breakpad");
        }

        builder = builder
            .arg("--disable-notifications")
            .arg("--disable-sync")
            .arg("--disable-default-apps")
            .arg("--log-level=3")
            .arg(format!("--user-data-dir={}", settings.user_data_dir.display()));

        builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))
    }
}

/// Fresh per-session directory Chromium downloads into before files are moved out
fn create_staging_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("cloudgrab_downloads_")
        .tempdir()
        .map_err(|e| anyhow!("Failed to create download staging directory: {}", e))
}
