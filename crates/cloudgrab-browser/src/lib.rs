//! Chromium session backend for the download workflow, driven over CDP with chromiumoxide.

pub mod context;
pub mod download;
pub mod launch;
pub mod page;
pub mod query;
pub mod state;

use chromiumoxide::error::CdpError;
use cloudgrab_core::SessionError;

pub use context::{ChromeContext, ChromePageWatch};
pub use download::{ChromeDownloadWatch, ChromeTransfer, DownloadSettings};
pub use launch::ChromeSession;
pub use page::{ChromeElement, ChromePage};
pub use state::SessionState;

pub(crate) fn browser_error(e: CdpError) -> SessionError {
    SessionError::Browser(e.to_string())
}
