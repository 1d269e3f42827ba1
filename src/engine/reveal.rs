use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use super::dom::{ClickTarget, WordsDom};

/// Delay after the pre-lookup scroll, letting lazy controls render.
pub const SCROLL_SETTLE: Duration = Duration::from_millis(1000);
/// Delay after a successful click, letting new items materialize.
pub const CLICK_SETTLE: Duration = Duration::from_millis(2000);

/// Fallback chain, strict priority order. The page's "More" control is
/// inconsistently labeled and sometimes not a proper button, so the chain
/// degrades from accessible-name matching to a raw text scan.
const STRATEGIES: &[(&str, ClickTarget)] = &[
    ("button by accessible name", ClickTarget::ButtonByAccessibleName("more")),
    ("button text 'More'", ClickTarget::ButtonByText("More")),
    ("button text 'more'", ClickTarget::ButtonByText("more")),
    ("button text 'Show more'", ClickTarget::ButtonByText("Show more")),
    ("button text 'Load more'", ClickTarget::ButtonByText("Load more")),
    ("button text 'See more'", ClickTarget::ButtonByText("See more")),
    ("text scan in words section", ClickTarget::TextInListSection("more")),
];

/// Try to trigger loading of additional items. `Ok(false)` is not an
/// error: it signals that nothing on the page currently offers more
/// content, which the controller reads as a possible end of list.
pub async fn try_reveal_more(dom: &dyn WordsDom) -> Result<bool> {
    // Latent controls only render near the bottom of the viewport.
    dom.scroll_to_bottom().await?;
    dom.settle(SCROLL_SETTLE).await;

    for (name, target) in STRATEGIES {
        if dom.click_first(*target).await? {
            info!("Revealed more via {}", name);
            dom.settle(CLICK_SETTLE).await;
            return Ok(true);
        }
        debug!("Strategy found nothing: {}", name);
    }

    info!("No reveal-more control found");
    Ok(false)
}

// ── Tests ──
