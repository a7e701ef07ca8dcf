//! Scroll-until-stable helpers shared by extraction and pagination.

use std::time::Duration;

use crate::error::AppError;
use crate::traits::{Page, PageElement};

const PAGE_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";
const PAGE_SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Bounds for a scroll-until-stable loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSettings {
    pub max_attempts: u32,
    /// Pause after each scroll so lazy content can load.
    pub pause: Duration,
}

impl ScrollSettings {
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self {
            max_attempts,
            pause,
        }
    }
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            pause: Duration::from_secs(2),
        }
    }
}

pub async fn page_height<P: Page>(page: &P) -> Result<f64, AppError> {
    let value = page.evaluate(PAGE_HEIGHT_SCRIPT).await?;
    value
        .as_f64()
        .ok_or_else(|| AppError::Browser(format!("Unexpected page height value: {value}")))
}

/// Scroll the whole page to its end until its height stops changing.
///
/// Returns the number of scrolls performed.
pub async fn scroll_page_to_end<P: Page>(
    page: &P,
    settings: ScrollSettings,
) -> Result<u32, AppError> {
    let mut last_height = None;
    let mut scrolls = 0;

    while scrolls < settings.max_attempts {
        let height = page_height(page).await?;
        if last_height == Some(height) {
            break;
        }
        page.evaluate(PAGE_SCROLL_SCRIPT).await?;
        tokio::time::sleep(settings.pause).await;
        last_height = Some(height);
        scrolls += 1;
    }

    tracing::debug!(scrolls, "Page scrolled to end");
    Ok(scrolls)
}

/// Scroll a container element to its end until its content stops growing.
pub async fn scroll_container_to_end<E: PageElement>(
    container: &E,
    settings: ScrollSettings,
) -> Result<u32, AppError> {
    let mut last_height = None;
    let mut scrolls = 0;

    while scrolls < settings.max_attempts {
        let height = container.scroll_height().await?;
        if last_height == Some(height) {
            break;
        }
        container.scroll_to_end().await?;
        tokio::time::sleep(settings.pause).await;
        last_height = Some(height);
        scrolls += 1;
    }

    tracing::debug!(scrolls, "Container scrolled to end");
    Ok(scrolls)
}
