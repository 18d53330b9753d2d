pub mod candidate;
pub mod capture;
pub mod popups;
pub mod readiness;
pub mod section;

pub use candidate::open_video_candidate;
pub use capture::{capture_download, verify_saved_file, SavedFile};
pub use popups::dismiss_popups;
pub use readiness::wait_for_action_control;
pub use section::{locate_section, SectionLocation};
