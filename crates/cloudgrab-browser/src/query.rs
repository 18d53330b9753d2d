//! Translate workflow queries into something CDP can answer.
//!
//! CSS queries go straight to `querySelectorAll`. Text queries run a script that tags every
//! matching element with a one-off attribute value, which is then selected with plain CSS.

use cloudgrab_core::Query;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MATCH_ATTRIBUTE: &str = "data-cloudgrab-match";

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// How to resolve one [`Query`] on a live page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Css(String),
    /// Run `script`, then select elements with `selector`
    Marked { script: String, selector: String },
}

pub fn resolve(query: &Query) -> Resolution {
    match query {
        Query::Css(selector) => Resolution::Css(selector.clone()),
        Query::TextPattern { pattern, case_insensitive } => {
            let token = next_token();
            let flags = if *case_insensitive { "i" } else { "" };
            Resolution::Marked {
                script: pattern_script(pattern, flags, &token),
                selector: marked_selector(&token),
            }
        }
        Query::HasText { css, text } => {
            let token = next_token();
            Resolution::Marked {
                script: has_text_script(css, text, &token),
                selector: marked_selector(&token),
            }
        }
    }
}

fn next_token() -> String {
    format!("m{}", NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
}

fn marked_selector(token: &str) -> String {
    format!("[{}='{}']", MATCH_ATTRIBUTE, token)
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Innermost elements whose rendered text matches the pattern
fn pattern_script(pattern: &str, flags: &str, token: &str) -> String {
    format!(
        r#"(() => {{
    const re = new RegExp({pattern}, {flags});
    const text = (el) => (el.innerText || el.textContent || '').trim();
    let count = 0;
    for (const el of document.querySelectorAll('body *')) {{
        if (!re.test(text(el))) continue;
        if (Array.from(el.children).some((child) => re.test(text(child)))) continue;
        el.setAttribute({attribute}, {token});
        count += 1;
    }}
    return count;
}})()"#,
        pattern = js_string(pattern),
        flags = js_string(flags),
        attribute = js_string(MATCH_ATTRIBUTE),
        token = js_string(token),
    )
}

/// Elements matching `css` whose text contains `needle`, ignoring case
fn has_text_script(css: &str, needle: &str, token: &str) -> String {
    format!(
        r#"(() => {{
    const needle = {needle}.toLowerCase();
    let count = 0;
    for (const el of document.querySelectorAll({css})) {{
        const text = (el.innerText || el.textContent || '').toLowerCase();
        if (!text.includes(needle)) continue;
        el.setAttribute({attribute}, {token});
        count += 1;
    }}
    return count;
}})()"#,
        needle = js_string(needle),
        css = js_string(css),
        attribute = js_string(MATCH_ATTRIBUTE),
        token = js_string(token),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_passes_through() {
        assert_eq!(
            resolve(&Query::css("video[poster]")),
            Resolution::Css("video[poster]".to_string())
        );
    }

    #[test]
    fn test_text_pattern_is_marked_and_selected() {
        let Resolution::Marked { script, selector } = resolve(&Query::literal_text(".mp4", true)) else {
            panic!("text queries need a marking script");
        };
        assert!(script.contains(r#"new RegExp("\\.mp4", "i")"#));
        let token = selector
            .trim_start_matches("[data-cloudgrab-match='")
            .trim_end_matches("']");
        assert!(script.contains(&format!("\"{}\"", token)));
    }

    #[test]
    fn test_each_resolution_gets_a_fresh_token() {
        let query = Query::has_text("button", "Download");
        let (Resolution::Marked { selector: first, .. }, Resolution::Marked { selector: second, .. }) =
            (resolve(&query), resolve(&query))
        else {
            panic!("has-text queries need a marking script");
        };
        assert_ne!(first, second);
    }

    #[test]
    fn test_quotes_in_text_are_escaped() {
        let Resolution::Marked { script, .. } = resolve(&Query::has_text("a", "Don't \"click\"")) else {
            panic!("has-text queries need a marking script");
        };
        assert!(script.contains(r#""Don't \"click\"".toLowerCase()"#));
        assert!(script.contains(r#"document.querySelectorAll("a")"#));
    }
}
