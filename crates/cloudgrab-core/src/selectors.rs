//! Ordered selector cascades for each workflow step.
//!
//! Earlier queries are more specific. New fallbacks are added here, the steps never change.

use cloudgrab_config::TargetConfig;
use std::fmt;

use crate::session::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    PopupClose,
    SectionHeading,
    VideoCandidate,
    ActionButton,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::PopupClose => "popup-close",
            StepKind::SectionHeading => "section-heading",
            StepKind::VideoCandidate => "video-candidate",
            StepKind::ActionButton => "action-button",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    step: StepKind,
    queries: Vec<Query>,
}

impl SelectorStrategy {
    pub fn new(step: StepKind, queries: Vec<Query>) -> Self {
        Self { step, queries }
    }

    pub fn step(&self) -> StepKind {
        self.step
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// The most specific query, used when only the canonical control matters
    pub fn primary(&self) -> Option<&Query> {
        self.queries.first()
    }

    pub fn popup_close() -> Self {
        Self::new(
            StepKind::PopupClose,
            vec![
                Query::css("button[aria-label*='close' i]"),
                Query::css("button[aria-label*='dismiss' i]"),
                Query::has_text("button", "×"),
                Query::has_text("button", "✕"),
                Query::has_text("button", "Close"),
                Query::css("[class*='close-button']"),
                Query::css("[class*='modal-close']"),
                Query::css("[data-testid*='close']"),
                Query::css("button[class*='close']"),
                Query::css(".modal button"),
                Query::css("[role='dialog'] button"),
            ],
        )
    }

    pub fn section_heading(label: &str) -> Self {
        Self::new(
            StepKind::SectionHeading,
            vec![
                Query::literal_text(label, true),
                Query::has_text("h2", label),
                Query::has_text("h3", label),
                Query::has_text("div", label),
                Query::has_text("*", label),
            ],
        )
    }

    pub fn video_candidates(target: &TargetConfig) -> Self {
        let mut queries = Vec::new();

        if let Some(hint) = target.title_hint.as_deref().filter(|h| !h.trim().is_empty()) {
            queries.push(Query::literal_text(hint.trim(), true));
        }
        queries.push(Query::literal_text(".mp4", true));

        for host in &target.thumbnail_hosts {
            queries.push(Query::css(format!("img[src*='{}']", css_string(host))));
        }

        queries.push(Query::css("video[poster]"));
        // Duration badge such as 01:12 or 1:02:33
        queries.push(Query::pattern(r"^\s*\d{1,2}:\d{2}(:\d{2})?\s*$", false));
        queries.push(Query::has_text("div", "Exported on"));
        queries.push(Query::css("a[href*='/view/']"));
        queries.push(Query::css("div[class*='card']"));
        queries.push(Query::css("div[class*='item']"));

        Self::new(StepKind::VideoCandidate, queries)
    }

    pub fn action_button(label: &str) -> Self {
        let lowered = css_string(&label.to_lowercase());
        Self::new(
            StepKind::ActionButton,
            vec![
                Query::has_text("button", label),
                Query::has_text("a", label),
                Query::css(format!("[aria-label*='{}' i]", css_string(label))),
                Query::css(format!("button[class*='{}']", lowered)),
                Query::css(format!(".{}-btn", lowered.replace(' ', "-"))),
            ],
        )
    }
}

/// Every cascade the downloader uses, built once from the target description
#[derive(Debug, Clone)]
pub struct Strategies {
    pub popup_close: SelectorStrategy,
    pub section_heading: SelectorStrategy,
    pub video_candidate: SelectorStrategy,
    pub action_button: SelectorStrategy,
}

impl Strategies {
    pub fn from_target(target: &TargetConfig) -> Self {
        Self {
            popup_close: SelectorStrategy::popup_close(),
            section_heading: SelectorStrategy::section_heading(&target.section_label),
            video_candidate: SelectorStrategy::video_candidates(target),
            action_button: SelectorStrategy::action_button(&target.action_label),
        }
    }
}

fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order_is_most_specific_first() {
        let target = TargetConfig {
            title_hint: Some("Environmental Pollution Video".to_string()),
            ..TargetConfig::default()
        };
        let strategy = SelectorStrategy::video_candidates(&target);
        let rendered: Vec<String> = strategy.queries().iter().map(|q| q.to_string()).collect();

        assert_eq!(strategy.step(), StepKind::VideoCandidate);
        assert_eq!(rendered[0], "text=/Environmental Pollution Video/i");
        assert_eq!(rendered[1], "text=/\\.mp4/i");
        assert_eq!(rendered[2], "img[src*='cloudfront']");
        assert_eq!(rendered[3], "img[src*='capcut']");
        assert_eq!(rendered[4], "video[poster]");
        assert_eq!(rendered.last().map(String::as_str), Some("div[class*='item']"));
    }

    #[test]
    fn test_candidates_without_hint_start_with_extension() {
        let strategy = SelectorStrategy::video_candidates(&TargetConfig::default());
        assert_eq!(strategy.primary(), Some(&Query::literal_text(".mp4", true)));
    }

    #[test]
    fn test_action_button_variants() {
        let strategy = SelectorStrategy::action_button("Download");
        let rendered: Vec<String> = strategy.queries().iter().map(|q| q.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "button:has-text('Download')",
                "a:has-text('Download')",
                "[aria-label*='Download' i]",
                "button[class*='download']",
                ".download-btn",
            ]
        );
    }

    #[test]
    fn test_section_heading_uses_label() {
        let strategy = SelectorStrategy::section_heading("Exported videos");
        assert_eq!(strategy.queries().len(), 5);
        assert_eq!(strategy.queries()[1], Query::has_text("h2", "Exported videos"));
    }

    #[test]
    fn test_quotes_in_labels_are_escaped() {
        let strategy = SelectorStrategy::action_button("Save 'now'");
        assert_eq!(strategy.queries()[2].to_string(), "[aria-label*='Save \\'now\\'' i]");
    }
}
