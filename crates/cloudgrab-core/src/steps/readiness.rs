use tracing::{info, warn};

use crate::error::SessionError;
use crate::poll::{PollOutcome, Poller};
use crate::selectors::SelectorStrategy;
use crate::session::{ElementHandle, PageHandle};

/// Poll the detail page until the primary action control is visible.
///
/// A timeout is reported to the caller but the download is still attempted, the capture step
/// runs its own full cascade.
pub async fn wait_for_action_control<P: PageHandle>(
    page: &P,
    strategy: &SelectorStrategy,
    poller: &Poller,
) -> PollOutcome {
    info!("Waiting for detail page to load...");

    let Some(query) = strategy.primary() else {
        return PollOutcome::TimedOut { ticks: 0 };
    };

    let outcome = poller
        .wait_until(|| async move {
            let elements = page.find_elements(query).await?;
            match elements.first() {
                Some(element) => element.is_visible().await,
                None => Ok::<bool, SessionError>(false),
            }
        })
        .await;

    match outcome {
        PollOutcome::Ready { ticks } => info!("Page loaded after {} second(s)", ticks),
        PollOutcome::TimedOut { ticks } => {
            warn!("Action control not detected after {} tick(s), continuing anyway", ticks)
        }
    }
    outcome
}
