//! Local filenames from detail page titles.

use chrono::Utc;
use serde::Serialize;
use std::fmt::Display;
use tracing::{debug, warn};

pub const VIDEO_EXTENSION: &str = ".mp4";

/// Branding separators. Text from the earliest one onwards is dropped.
const TITLE_SEPARATORS: [&str; 3] = [" All-in-one video editor", " | ", " - "];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedFilename {
    pub name: String,
    /// True when the title was unusable and the timestamp name was used
    pub fallback: bool,
}

/// Filename for a page title read just now
pub fn derive_filename_now<E: Display>(title: Result<String, E>, fallback_prefix: &str) -> DerivedFilename {
    derive_filename(title, fallback_prefix, Utc::now().timestamp())
}

/// Sanitized `<stem>.mp4` from a page title, or `<prefix>_<unix time>.mp4` when the title is
/// missing or sanitizes to nothing. Deriving from an already derived name returns it unchanged.
pub fn derive_filename<E: Display>(
    title: Result<String, E>,
    fallback_prefix: &str,
    now_unix: i64,
) -> DerivedFilename {
    let title = match title {
        Ok(title) => title,
        Err(e) => {
            warn!("Could not read page title: {}", e);
            return fallback(fallback_prefix, now_unix);
        }
    };

    let stem = sanitize_stem(&title);
    if stem.is_empty() {
        debug!("Title {:?} has no usable characters", title);
        return fallback(fallback_prefix, now_unix);
    }

    DerivedFilename {
        name: format!("{}{}", stem, VIDEO_EXTENSION),
        fallback: false,
    }
}

fn fallback(prefix: &str, now_unix: i64) -> DerivedFilename {
    let prefix = filter_permitted(prefix);
    let prefix = match prefix.trim() {
        "" => "video",
        trimmed => trimmed,
    };
    DerivedFilename {
        name: format!("{}_{}{}", prefix, now_unix, VIDEO_EXTENSION),
        fallback: true,
    }
}

/// Repeat one cleanup pass until nothing changes. Every pass only removes characters, so this
/// terminates.
fn sanitize_stem(title: &str) -> String {
    let mut current = title.to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    let mut text = text;
    for separator in TITLE_SEPARATORS {
        if let Some(cut) = text.find(separator) {
            text = &text[..cut];
        }
    }

    loop {
        let trimmed = text.trim_end();
        let split = trimmed.len().saturating_sub(VIDEO_EXTENSION.len());
        match trimmed.get(split..) {
            Some(tail) if tail.eq_ignore_ascii_case(VIDEO_EXTENSION) => text = &trimmed[..split],
            _ => break,
        }
    }

    filter_permitted(text).trim().to_string()
}

fn filter_permitted(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect()
}
