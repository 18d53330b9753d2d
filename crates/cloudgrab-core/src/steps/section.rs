use cloudgrab_config::Timeouts;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::resolve::{cascade, Attempt};
use crate::selectors::SelectorStrategy;
use crate::session::{ElementHandle, PageHandle};

const FALLBACK_SCROLL_STEPS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLocation {
    /// Heading found via the query at this index and scrolled into view
    Heading { query_index: usize },
    /// Heading not found, scrolled to fixed offsets instead
    FallbackScroll { final_offset_px: u32 },
}

/// Bring the exported-videos section into the viewport. Scroll position is advisory, so this
/// degrades to fixed offsets instead of failing.
pub async fn locate_section<P: PageHandle>(
    page: &P,
    strategy: &SelectorStrategy,
    timeouts: &Timeouts,
) -> SectionLocation {
    info!("Scrolling to exported videos section...");

    let settle = timeouts.section_settle();
    let sweep = cascade(page, strategy, Some(1), |position, element| async move {
        if let Err(e) = element.scroll_into_view().await {
            debug!("Could not scroll heading into view: {}", e);
            return Attempt::Miss;
        }
        sleep(settle).await;
        Attempt::Stop(position.query_index)
    })
    .await;

    if let Some(query_index) = sweep.found {
        let offset = timeouts.section_scroll_offset_px;
        if let Err(e) = page.evaluate_script(&format!("window.scrollBy(0, {})", offset)).await {
            warn!("Failed to scroll below section heading: {}", e);
        }
        sleep(settle).await;
        info!("Found section heading, scrolled into view");
        return SectionLocation::Heading { query_index };
    }

    warn!("Could not find section heading, scrolling down page...");
    let step = timeouts.fallback_scroll_step_px;
    let mut final_offset_px = 0;
    for i in 1..=FALLBACK_SCROLL_STEPS {
        let offset = i * step;
        if let Err(e) = page.evaluate_script(&format!("window.scrollTo(0, {})", offset)).await {
            warn!("Failed to scroll to {}px: {}", offset, e);
        }
        sleep(timeouts.fallback_scroll_settle()).await;
        debug!("Scrolled to position {}px", offset);
        final_offset_px = offset;
    }

    SectionLocation::FallbackScroll { final_offset_px }
}
