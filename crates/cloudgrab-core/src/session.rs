//! Capabilities the workflow borrows from a browser session.
//!
//! Nothing in this crate launches a browser. A backend implements these traits for its own page,
//! element and download types and hands a [`Session`] to the downloader.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::SessionError;

/// One element query. Backends translate these into whatever their DOM access supports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// Plain CSS selector
    Css(String),
    /// Innermost elements whose rendered text matches a regular expression
    TextPattern { pattern: String, case_insensitive: bool },
    /// Elements matching `css` whose rendered text contains `text`, ignoring case
    HasText { css: String, text: String },
}

impl Query {
    pub fn css(selector: impl Into<String>) -> Self {
        Query::Css(selector.into())
    }

    pub fn pattern(pattern: impl Into<String>, case_insensitive: bool) -> Self {
        Query::TextPattern {
            pattern: pattern.into(),
            case_insensitive,
        }
    }

    /// Text match on a literal string; regex metacharacters are escaped
    pub fn literal_text(text: &str, case_insensitive: bool) -> Self {
        Query::pattern(escape_regex(text), case_insensitive)
    }

    pub fn has_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Query::HasText {
            css: css.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Css(selector) => write!(f, "{}", selector),
            Query::TextPattern { pattern, case_insensitive } => {
                write!(f, "text=/{}/{}", pattern, if *case_insensitive { "i" } else { "" })
            }
            Query::HasText { css, text } => write!(f, "{}:has-text('{}')", css, text),
        }
    }
}

pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn is_visible(&self) -> Result<bool, SessionError>;
    async fn click(&self, timeout: Duration) -> Result<(), SessionError>;
    async fn scroll_into_view(&self) -> Result<(), SessionError>;
}

/// A file transfer the page started
#[async_trait]
pub trait TransferHandle: Send {
    /// Name the remote side proposed. Informational only.
    fn suggested_filename(&self) -> &str;

    /// Wait for the transfer to finish and place the file at `path`
    async fn save_as(self, path: &Path) -> Result<(), SessionError>;
}

/// Download observer armed before the triggering click
#[async_trait]
pub trait DownloadWatch: Send {
    type Transfer: TransferHandle;

    async fn wait(self, timeout: Duration) -> Result<Self::Transfer, SessionError>;
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    type Element: ElementHandle;
    type Download: DownloadWatch;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), SessionError>;
    async fn current_url(&self) -> Result<String, SessionError>;
    async fn find_elements(&self, query: &Query) -> Result<Vec<Self::Element>, SessionError>;
    async fn evaluate_script(&self, expression: &str) -> Result<(), SessionError>;
    async fn press_key(&self, key: &str) -> Result<(), SessionError>;
    async fn title(&self) -> Result<String, SessionError>;
    async fn screenshot(&self, path: &Path) -> Result<(), SessionError>;

    /// Start listening for a download. Must be called before the action that triggers it.
    async fn watch_download(&self) -> Result<Self::Download, SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}

/// New-page observer armed before the click that opens the page
#[async_trait]
pub trait PageWatch: Send {
    type Page;

    async fn wait(self, timeout: Duration) -> Result<Self::Page, SessionError>;
}

#[async_trait]
pub trait BrowsingContext: Send + Sync {
    type Page: PageHandle;
    type Watch: PageWatch<Page = Self::Page>;

    async fn watch_new_page(&self) -> Result<Self::Watch, SessionError>;
}

/// The caller's page and browsing context, borrowed for one download
pub struct Session<'a, C: BrowsingContext> {
    pub page: &'a C::Page,
    pub context: &'a C,
}

impl<'a, C: BrowsingContext> Session<'a, C> {
    pub fn new(page: &'a C::Page, context: &'a C) -> Self {
        Self { page, context }
    }
}

impl<C: BrowsingContext> Clone for Session<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: BrowsingContext> Copy for Session<'_, C> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_display_matches_selector_notation() {
        assert_eq!(Query::css("video[poster]").to_string(), "video[poster]");
        assert_eq!(
            Query::literal_text("Exported videos", true).to_string(),
            "text=/Exported videos/i"
        );
        assert_eq!(
            Query::has_text("button", "Download").to_string(),
            "button:has-text('Download')"
        );
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex(".mp4"), "\\.mp4");
        assert_eq!(escape_regex("a (b) c"), "a \\(b\\) c");
        assert_eq!(escape_regex("plain"), "plain");
    }
}
