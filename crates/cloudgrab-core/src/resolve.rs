//! "Try each query in order, act on visible matches" shared by every discovery step.

use std::future::Future;
use tracing::debug;

use crate::selectors::SelectorStrategy;
use crate::session::{ElementHandle, PageHandle};

/// Position of a match inside the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRef {
    pub query_index: usize,
    pub match_index: usize,
}

/// What an action did with one visible match
pub enum Attempt<T> {
    /// Terminal success, the cascade stops
    Stop(T),
    /// Counted, cascade continues
    Hit,
    /// Failed on this match, cascade continues
    Miss,
}

#[derive(Debug)]
pub struct Sweep<T> {
    pub found: Option<T>,
    /// Visible matches handed to the action
    pub visible: usize,
    pub hits: usize,
}

impl<T> Sweep<T> {
    fn empty() -> Self {
        Self { found: None, visible: 0, hits: 0 }
    }
}

/// Walk `strategy` in declared order, run `action` on each visible match among the first
/// `limit` matches of every query, and stop at the first [`Attempt::Stop`].
///
/// Query failures and visibility errors are logged and skipped.
pub async fn cascade<P, T, F, Fut>(
    page: &P,
    strategy: &SelectorStrategy,
    limit: Option<usize>,
    mut action: F,
) -> Sweep<T>
where
    P: PageHandle,
    F: FnMut(MatchRef, P::Element) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut sweep = Sweep::empty();

    for (query_index, query) in strategy.queries().iter().enumerate() {
        debug!("[{}] Trying: {}", strategy.step(), query);
        let elements = match page.find_elements(query).await {
            Ok(elements) => elements,
            Err(e) => {
                debug!("[{}] Selector failed: {}: {}", strategy.step(), query, e);
                continue;
            }
        };
        debug!("[{}] Found {} elements", strategy.step(), elements.len());

        let bound = limit.unwrap_or(usize::MAX);
        for (match_index, element) in elements.into_iter().take(bound).enumerate() {
            match element.is_visible().await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!("[{}] Visibility check failed for match {}: {}", strategy.step(), match_index + 1, e);
                    continue;
                }
            }

            sweep.visible += 1;
            let position = MatchRef { query_index, match_index };
            match action(position, element).await {
                Attempt::Stop(value) => {
                    sweep.found = Some(value);
                    return sweep;
                }
                Attempt::Hit => sweep.hits += 1,
                Attempt::Miss => {}
            }
        }
    }

    sweep
}

/// First visible element of the cascade, with its position
pub async fn first_visible<P: PageHandle>(
    page: &P,
    strategy: &SelectorStrategy,
    limit: Option<usize>,
) -> Option<(MatchRef, P::Element)> {
    cascade(page, strategy, limit, |position, element| async move {
        Attempt::Stop((position, element))
    })
    .await
    .found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::StepKind;
    use crate::session::Query;
    use crate::testing::{ElementBehavior, FakeContext};

    fn strategy() -> SelectorStrategy {
        SelectorStrategy::new(
            StepKind::ActionButton,
            vec![Query::css("#missing"), Query::css(".hidden"), Query::css(".target")],
        )
    }

    #[tokio::test]
    async fn test_first_visible_skips_empty_and_hidden_queries() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com");
        page.add(Query::css(".hidden"), ElementBehavior::hidden());
        page.add(Query::css(".target"), ElementBehavior::hidden());
        page.add(Query::css(".target"), ElementBehavior::visible());

        let (position, _) = first_visible(&page, &strategy(), None).await.unwrap();
        assert_eq!(position, MatchRef { query_index: 2, match_index: 1 });
    }

    #[tokio::test]
    async fn test_limit_bounds_matches_per_query() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com");
        for _ in 0..5 {
            page.add(Query::css(".target"), ElementBehavior::hidden());
        }
        page.add(Query::css(".target"), ElementBehavior::visible());

        assert!(first_visible(&page, &strategy(), Some(5)).await.is_none());
        assert!(first_visible(&page, &strategy(), Some(6)).await.is_some());
    }

    #[tokio::test]
    async fn test_failing_query_does_not_stop_cascade() {
        let context = FakeContext::new();
        let page = context.new_page("https://example.com");
        page.fail_query(Query::css("#missing"));
        page.add(Query::css(".target"), ElementBehavior::visible());

        let sweep = cascade(&page, &strategy(), None, |_, _| async { Attempt::<()>::Hit }).await;
        assert!(sweep.found.is_none());
        assert_eq!(sweep.visible, 1);
        assert_eq!(sweep.hits, 1);
    }
}
