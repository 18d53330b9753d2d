pub mod error;
pub mod filename;
pub mod orchestrator;
pub mod poll;
pub mod resolve;
pub mod selectors;
pub mod session;
pub mod steps;

#[cfg(test)]
mod testing;

pub use error::{DownloadError, SessionError};
pub use filename::{derive_filename, derive_filename_now, DerivedFilename, VIDEO_EXTENSION};
pub use orchestrator::{DownloadFailure, DownloadResult, DownloadedVideo, Downloader, Stage};
pub use poll::{PollOutcome, Poller};
pub use selectors::{SelectorStrategy, StepKind, Strategies};
pub use session::{
    BrowsingContext, DownloadWatch, ElementHandle, PageHandle, PageWatch, Query, Session, TransferHandle,
};
