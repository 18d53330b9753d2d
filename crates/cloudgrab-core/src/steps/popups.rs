use cloudgrab_config::Timeouts;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::resolve::{cascade, Attempt};
use crate::selectors::SelectorStrategy;
use crate::session::{ElementHandle, PageHandle};

/// Best-effort sweep for overlay close buttons, followed by an Escape key press.
/// Returns how many overlays were clicked away. Never fails.
pub async fn dismiss_popups<P: PageHandle>(
    page: &P,
    strategy: &SelectorStrategy,
    timeouts: &Timeouts,
) -> usize {
    info!("Checking for popups...");

    let click_timeout = timeouts.popup_click();
    let settle = timeouts.popup_settle();
    let sweep = cascade(page, strategy, None, |position, element| async move {
        match element.click(click_timeout).await {
            Ok(()) => {
                debug!(
                    "Closed popup via selector {} match {}",
                    position.query_index + 1,
                    position.match_index + 1
                );
                sleep(settle).await;
                Attempt::<()>::Hit
            }
            Err(e) => {
                debug!("Popup close click failed, moving on: {}", e);
                Attempt::Miss
            }
        }
    })
    .await;

    match page.press_key("Escape").await {
        Ok(()) => {
            sleep(settle).await;
            debug!("Pressed Escape key");
        }
        Err(e) => warn!("Failed to press Escape: {}", e),
    }

    if sweep.hits > 0 {
        info!("Closed {} popup(s)", sweep.hits);
    } else {
        info!("No popups found");
    }
    sweep.hits
}
