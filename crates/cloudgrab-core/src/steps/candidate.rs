use cloudgrab_config::Timeouts;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::resolve::{cascade, Attempt};
use crate::selectors::SelectorStrategy;
use crate::session::{BrowsingContext, ElementHandle, PageWatch, Session};

/// Click the first exported video that opens a detail page and return that page.
///
/// The new-page observer is armed before every click. Clicking first would let the page open
/// before anyone listens for it.
pub async fn open_video_candidate<C: BrowsingContext>(
    session: Session<'_, C>,
    strategy: &SelectorStrategy,
    match_limit: usize,
    timeouts: &Timeouts,
) -> Result<C::Page, DownloadError> {
    info!("Looking for first exported video...");

    let context = session.context;
    let click_timeout = timeouts.candidate_click();
    let page_timeout = timeouts.new_page();
    let sweep = cascade(session.page, strategy, Some(match_limit), |position, element| async move {
        let watch = match context.watch_new_page().await {
            Ok(watch) => watch,
            Err(e) => {
                warn!("Could not arm new page listener: {}", e);
                return Attempt::Miss;
            }
        };

        debug!(
            "Trying selector {} element {}...",
            position.query_index + 1,
            position.match_index + 1
        );
        if let Err(e) = element.click(click_timeout).await {
            debug!("Element {} failed: {}", position.match_index + 1, e);
            return Attempt::Miss;
        }
        drop(element);

        match watch.wait(page_timeout).await {
            Ok(page) => {
                info!(
                    "New page captured from selector {} element {}",
                    position.query_index + 1,
                    position.match_index + 1
                );
                Attempt::Stop(page)
            }
            Err(e) => {
                info!("Click did not open a detail page: {}", e);
                Attempt::Miss
            }
        }
    })
    .await;

    match sweep.found {
        Some(page) => Ok(page),
        None if sweep.visible == 0 => Err(DownloadError::Discovery {
            what: "exported video",
        }),
        None => Err(DownloadError::SpawnTimeout {
            what: "video detail page",
            timeout: page_timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PageHandle, Query};
    use crate::testing::{ElementBehavior, FakeContext};
    use cloudgrab_config::TargetConfig;

    fn strategy() -> SelectorStrategy {
        SelectorStrategy::video_candidates(&TargetConfig::default())
    }

    #[tokio::test]
    async fn test_observer_armed_before_click() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com/my-cloud");
        let detail = context.new_page("https://example.com/view/42");
        page.add(Query::css("video[poster]"), ElementBehavior::opens(detail));

        let opened = open_video_candidate(Session::new(&page, &context), &strategy(), 5, &Timeouts::immediate())
            .await
            .unwrap();

        assert_eq!(opened.current_url().await.unwrap(), "https://example.com/view/42");
        assert_eq!(
            context.journal(),
            vec!["arm_page", "click:video[poster]#1", "page_opened"]
        );
    }

    #[tokio::test]
    async fn test_dead_clicks_fall_through_to_next_selector() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com/my-cloud");
        let detail = context.new_page("https://example.com/view/7");
        page.add(Query::literal_text(".mp4", true), ElementBehavior::visible())
            .add(Query::literal_text(".mp4", true), ElementBehavior::failing_click())
            .add(Query::css("a[href*='/view/']"), ElementBehavior::opens(detail));

        let opened = open_video_candidate(Session::new(&page, &context), &strategy(), 5, &Timeouts::immediate())
            .await
            .unwrap();

        assert_eq!(opened.current_url().await.unwrap(), "https://example.com/view/7");
        let clicks = context.journal().iter().filter(|e| e.starts_with("click:")).count();
        assert_eq!(clicks, 3);
    }

    #[tokio::test]
    async fn test_only_first_matches_are_tried() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com/my-cloud");
        let detail = context.new_page("https://example.com/view/9");
        for _ in 0..5 {
            page.add(Query::css("div[class*='card']"), ElementBehavior::visible());
        }
        page.add(Query::css("div[class*='card']"), ElementBehavior::opens(detail));

        let err = open_video_candidate(Session::new(&page, &context), &strategy(), 5, &Timeouts::immediate())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::SpawnTimeout { what: "video detail page", .. }));
    }

    #[tokio::test]
    async fn test_nothing_visible_is_discovery_error() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com/my-cloud");
        page.add(Query::css("video[poster]"), ElementBehavior::hidden());

        let err = open_video_candidate(Session::new(&page, &context), &strategy(), 5, &Timeouts::immediate())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Discovery { what: "exported video" }));
        assert!(context.journal().is_empty());
    }
}
