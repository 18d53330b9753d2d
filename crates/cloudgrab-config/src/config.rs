use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::paths::PathManager;

pub const DEFAULT_COLLECTION_URL: &str =
    "https://www.capcut.com/my-cloud/7528656611502751805?tab=all&enter_from=page_header";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// What to look for on the remote collection page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_collection_url")]
    pub collection_url: String,

    /// Navigation is accepted only if the landed URL contains this segment (case-insensitive)
    #[serde(default = "default_expected_url_segment")]
    pub expected_url_segment: String,

    #[serde(default = "default_section_label")]
    pub section_label: String,

    /// Label of the save/export control on the detail page
    #[serde(default = "default_action_label")]
    pub action_label: String,

    /// Title text of the video we expect to be the newest export, tried before anything generic
    #[serde(default)]
    pub title_hint: Option<String>,

    /// Substrings identifying thumbnail CDN hosts in `img[src]`
    #[serde(default = "default_thumbnail_hosts")]
    pub thumbnail_hosts: Vec<String>,

    #[serde(default = "default_fallback_prefix")]
    pub fallback_filename_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_dir")]
    pub dir: PathBuf,

    /// How many matches per candidate selector are tried before moving on
    #[serde(default = "default_candidate_match_limit")]
    pub candidate_match_limit: usize,

    #[serde(default = "default_true")]
    pub debug_screenshot: bool,
}

/// Every wait the workflow performs. Durations are stored as plain integers so the TOML stays readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_navigation_secs")]
    pub navigation_secs: u64,
    #[serde(default = "default_post_navigation_settle_ms")]
    pub post_navigation_settle_ms: u64,
    #[serde(default = "default_popup_click_ms")]
    pub popup_click_ms: u64,
    #[serde(default = "default_popup_settle_ms")]
    pub popup_settle_ms: u64,
    #[serde(default = "default_section_settle_ms")]
    pub section_settle_ms: u64,
    #[serde(default = "default_section_scroll_offset_px")]
    pub section_scroll_offset_px: u32,
    #[serde(default = "default_fallback_scroll_step_px")]
    pub fallback_scroll_step_px: u32,
    #[serde(default = "default_fallback_scroll_settle_ms")]
    pub fallback_scroll_settle_ms: u64,
    #[serde(default = "default_candidate_settle_ms")]
    pub candidate_settle_ms: u64,
    #[serde(default = "default_candidate_click_ms")]
    pub candidate_click_ms: u64,
    #[serde(default = "default_new_page_secs")]
    pub new_page_secs: u64,
    #[serde(default = "default_readiness_ticks")]
    pub readiness_ticks: u32,
    #[serde(default = "default_readiness_tick_ms")]
    pub readiness_tick_ms: u64,
    #[serde(default = "default_detail_settle_ms")]
    pub detail_settle_ms: u64,
    #[serde(default = "default_action_click_ms")]
    pub action_click_ms: u64,
    #[serde(default = "default_download_event_secs")]
    pub download_event_secs: u64,
    #[serde(default = "default_download_complete_secs")]
    pub download_complete_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,

    /// Explicit Chromium binary; discovered automatically when unset
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// JSON file holding the authenticated session cookies
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    #[serde(default = "default_user_data_dir")]
    pub user_data_dir: PathBuf,

    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

fn default_true() -> bool {
    true
}

fn default_collection_url() -> String {
    DEFAULT_COLLECTION_URL.to_string()
}

fn default_expected_url_segment() -> String {
    "my-cloud".to_string()
}

fn default_section_label() -> String {
    "Exported videos".to_string()
}

fn default_action_label() -> String {
    "Download".to_string()
}

fn default_thumbnail_hosts() -> Vec<String> {
    vec!["cloudfront".to_string(), "capcut".to_string()]
}

fn default_fallback_prefix() -> String {
    "capcut_video".to_string()
}

fn default_download_dir() -> PathBuf {
    PathManager::default().download_dir()
}

fn default_candidate_match_limit() -> usize {
    5
}

fn default_navigation_secs() -> u64 {
    60
}

fn default_post_navigation_settle_ms() -> u64 {
    5000
}

fn default_popup_click_ms() -> u64 {
    2000
}

fn default_popup_settle_ms() -> u64 {
    1000
}

fn default_section_settle_ms() -> u64 {
    2000
}

fn default_section_scroll_offset_px() -> u32 {
    200
}

fn default_fallback_scroll_step_px() -> u32 {
    500
}

fn default_fallback_scroll_settle_ms() -> u64 {
    1000
}

fn default_candidate_settle_ms() -> u64 {
    2000
}

fn default_candidate_click_ms() -> u64 {
    5000
}

fn default_new_page_secs() -> u64 {
    20
}

fn default_readiness_ticks() -> u32 {
    45
}

fn default_readiness_tick_ms() -> u64 {
    1000
}

fn default_detail_settle_ms() -> u64 {
    3000
}

fn default_action_click_ms() -> u64 {
    5000
}

fn default_download_event_secs() -> u64 {
    60
}

fn default_download_complete_secs() -> u64 {
    600
}

fn default_session_file() -> PathBuf {
    PathManager::default().session_file()
}

fn default_user_data_dir() -> PathBuf {
    PathManager::default().browser_profile_dir()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            collection_url: default_collection_url(),
            expected_url_segment: default_expected_url_segment(),
            section_label: default_section_label(),
            action_label: default_action_label(),
            title_hint: None,
            thumbnail_hosts: default_thumbnail_hosts(),
            fallback_filename_prefix: default_fallback_prefix(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: default_download_dir(),
            candidate_match_limit: default_candidate_match_limit(),
            debug_screenshot: true,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_secs: default_navigation_secs(),
            post_navigation_settle_ms: default_post_navigation_settle_ms(),
            popup_click_ms: default_popup_click_ms(),
            popup_settle_ms: default_popup_settle_ms(),
            section_settle_ms: default_section_settle_ms(),
            section_scroll_offset_px: default_section_scroll_offset_px(),
            fallback_scroll_step_px: default_fallback_scroll_step_px(),
            fallback_scroll_settle_ms: default_fallback_scroll_settle_ms(),
            candidate_settle_ms: default_candidate_settle_ms(),
            candidate_click_ms: default_candidate_click_ms(),
            new_page_secs: default_new_page_secs(),
            readiness_ticks: default_readiness_ticks(),
            readiness_tick_ms: default_readiness_tick_ms(),
            detail_settle_ms: default_detail_settle_ms(),
            action_click_ms: default_action_click_ms(),
            download_event_secs: default_download_event_secs(),
            download_complete_secs: default_download_complete_secs(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_executable: None,
            session_file: default_session_file(),
            user_data_dir: default_user_data_dir(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            download: DownloadConfig::default(),
            timeouts: Timeouts::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Timeouts {
    /// All waits collapsed to zero and polls limited to a handful of ticks
    #[cfg(any(test, feature = "test-util"))]
    pub fn immediate() -> Self {
        Self {
            navigation_secs: 1,
            post_navigation_settle_ms: 0,
            popup_click_ms: 10,
            popup_settle_ms: 0,
            section_settle_ms: 0,
            section_scroll_offset_px: 200,
            fallback_scroll_step_px: 500,
            fallback_scroll_settle_ms: 0,
            candidate_settle_ms: 0,
            candidate_click_ms: 10,
            new_page_secs: 1,
            readiness_ticks: 3,
            readiness_tick_ms: 0,
            detail_settle_ms: 0,
            action_click_ms: 10,
            download_event_secs: 1,
            download_complete_secs: 1,
        }
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn post_navigation_settle(&self) -> Duration {
        Duration::from_millis(self.post_navigation_settle_ms)
    }

    pub fn popup_click(&self) -> Duration {
        Duration::from_millis(self.popup_click_ms)
    }

    pub fn popup_settle(&self) -> Duration {
        Duration::from_millis(self.popup_settle_ms)
    }

    pub fn section_settle(&self) -> Duration {
        Duration::from_millis(self.section_settle_ms)
    }

    pub fn fallback_scroll_settle(&self) -> Duration {
        Duration::from_millis(self.fallback_scroll_settle_ms)
    }

    pub fn candidate_settle(&self) -> Duration {
        Duration::from_millis(self.candidate_settle_ms)
    }

    pub fn candidate_click(&self) -> Duration {
        Duration::from_millis(self.candidate_click_ms)
    }

    pub fn new_page(&self) -> Duration {
        Duration::from_secs(self.new_page_secs)
    }

    pub fn readiness_tick(&self) -> Duration {
        Duration::from_millis(self.readiness_tick_ms)
    }

    pub fn detail_settle(&self) -> Duration {
        Duration::from_millis(self.detail_settle_ms)
    }

    pub fn action_click(&self) -> Duration {
        Duration::from_millis(self.action_click_ms)
    }

    pub fn download_event(&self) -> Duration {
        Duration::from_secs(self.download_event_secs)
    }

    pub fn download_complete(&self) -> Duration {
        Duration::from_secs(self.download_complete_secs)
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let target = &self.target;
        if !target.collection_url.starts_with("http://") && !target.collection_url.starts_with("https://") {
            return Err(anyhow::anyhow!("collection_url must be an http(s) URL: {}", target.collection_url));
        }
        if target.expected_url_segment.trim().is_empty() {
            return Err(anyhow::anyhow!("expected_url_segment cannot be empty"));
        }
        if target.section_label.trim().is_empty() {
            return Err(anyhow::anyhow!("section_label cannot be empty"));
        }
        if target.action_label.trim().is_empty() {
            return Err(anyhow::anyhow!("action_label cannot be empty"));
        }
        if target.fallback_filename_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("fallback_filename_prefix cannot be empty"));
        }

        if self.download.candidate_match_limit == 0 {
            return Err(anyhow::anyhow!("candidate_match_limit must be at least 1"));
        }

        let timeouts = &self.timeouts;
        let hard_waits = [
            ("navigation_secs", timeouts.navigation_secs),
            ("new_page_secs", timeouts.new_page_secs),
            ("download_event_secs", timeouts.download_event_secs),
            ("download_complete_secs", timeouts.download_complete_secs),
        ];
        for (name, value) in hard_waits {
            if value == 0 {
                return Err(anyhow::anyhow!("{} must be greater than zero", name));
            }
        }
        if timeouts.readiness_ticks == 0 {
            return Err(anyhow::anyhow!("readiness_ticks must be greater than zero"));
        }

        Ok(())
    }
}
