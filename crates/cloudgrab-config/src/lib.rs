pub mod config;
pub mod paths;

pub use config::{BrowserConfig, Config, DownloadConfig, TargetConfig, Timeouts, DEFAULT_COLLECTION_URL};
pub use paths::{PathManager, container_base_path};
