//! Pagination through listing pages.
//!
//! The "next page" control is located by an ordered chain of independent
//! strategies. The first strategy that yields a visible match wins.
//!
//! ```text
//! Positioned(n) --detect--> Found --click + settle--> Positioned(n + 1)
//!                       \-> NotFound      (terminal for the site)
//!                       \-> LimitReached  (terminal for the site)
//! ```

use std::time::Duration;

use crate::error::AppError;
use crate::scroll::{ScrollSettings, scroll_page_to_end};
use crate::traits::{Page, PageElement};

/// Keywords that mark a "next page" control.
pub const NEXT_KEYWORDS: &[&str] = &["next"];

/// Arrow glyphs that mark a "next page" control.
pub const ARROW_GLYPHS: &[&str] = &["›", "→", ">"];

/// Known markup meaning "next page".
pub const STRUCTURAL_NEXT_SELECTORS: &[&str] = &[
    "a[rel='next']",
    "button[rel='next']",
    "[aria-label='next' i]",
    "[aria-label='next page' i]",
    "button[data-uxi-widget-type='stepToNextPage']",
    "[data-testid='pagination-next']",
    ".pagination-next a",
    "li.next a",
    "a.next",
    "button.next",
];

/// Elements a user can click.
pub const CLICKABLE_SELECTOR: &str = "a, button, [role='button'], [role='link']";

/// Labels longer than this are prose, not a pagination control.
const MAX_LABEL_CHARS: usize = 40;

const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Returns the keyword or glyph found in `content`, if any.
pub fn next_marker(content: &str) -> Option<&'static str> {
    let content = content.to_lowercase();
    NEXT_KEYWORDS
        .iter()
        .chain(ARROW_GLYPHS)
        .copied()
        .find(|marker| content.contains(marker))
}

fn short_label_marker(label: &str) -> Option<&'static str> {
    let label = label.trim();
    if label.is_empty() || label.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    next_marker(label)
}

/// One way of locating the "next page" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPageStrategy {
    /// Known attribute/role signatures such as `rel="next"`.
    StructuralMarker,
    /// Accessible name (aria-label, then text, then title) matches the pattern.
    AccessibleName,
    /// Visible text of a clickable element matches the pattern.
    VisibleText,
    /// Catch-all over class, title, aria-label, href and `data-*` values.
    AttributeScan,
}

impl NextPageStrategy {
    /// Default detection order.
    pub const CHAIN: [NextPageStrategy; 4] = [
        NextPageStrategy::StructuralMarker,
        NextPageStrategy::AccessibleName,
        NextPageStrategy::VisibleText,
        NextPageStrategy::AttributeScan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NextPageStrategy::StructuralMarker => "structural-marker",
            NextPageStrategy::AccessibleName => "accessible-name",
            NextPageStrategy::VisibleText => "visible-text",
            NextPageStrategy::AttributeScan => "attribute-scan",
        }
    }

    fn selectors(&self) -> &'static [&'static str] {
        match self {
            NextPageStrategy::StructuralMarker => STRUCTURAL_NEXT_SELECTORS,
            _ => &[CLICKABLE_SELECTOR],
        }
    }

    async fn matches<E: PageElement>(&self, element: &E) -> Result<bool, AppError> {
        let marker = match self {
            NextPageStrategy::StructuralMarker => return Ok(true),
            NextPageStrategy::AccessibleName => {
                let name = match element.attribute("aria-label").await? {
                    Some(label) if !label.trim().is_empty() => label,
                    _ => {
                        let text = element.text().await?;
                        if text.trim().is_empty() {
                            element.attribute("title").await?.unwrap_or_default()
                        } else {
                            text
                        }
                    }
                };
                short_label_marker(&name)
            }
            NextPageStrategy::VisibleText => short_label_marker(&element.text().await?),
            NextPageStrategy::AttributeScan => {
                let mut content = Vec::new();
                for name in ["class", "title", "aria-label", "href"] {
                    if let Some(value) = element.attribute(name).await? {
                        content.push(value);
                    }
                }
                for name in element.attribute_names().await? {
                    if name.starts_with("data-")
                        && let Some(value) = element.attribute(&name).await?
                    {
                        content.push(value);
                    }
                }
                next_marker(&content.join(" "))
            }
        };

        if let Some(marker) = marker {
            tracing::debug!(strategy = self.name(), %marker, "Next page marker matched");
        }
        Ok(marker.is_some())
    }

    /// First visible element on `page` this strategy accepts.
    ///
    /// Selector and per-element failures are skipped, never propagated.
    pub async fn locate<P: Page>(&self, page: &P) -> Option<P::Element> {
        for selector in self.selectors() {
            let elements = match page.query_all(selector).await {
                Ok(elements) => elements,
                Err(e) => {
                    tracing::debug!(%selector, error = %e, "Selector failed");
                    continue;
                }
            };

            for element in elements {
                match element.is_visible().await {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "Visibility check failed");
                        continue;
                    }
                }
                match self.matches(&element).await {
                    Ok(true) => return Some(element),
                    Ok(false) => {}
                    Err(e) => tracing::debug!(error = %e, "Error checking element"),
                }
            }
        }
        None
    }
}

/// Limits and waits for the navigator.
#[derive(Debug, Clone)]
pub struct NavigatorConfig {
    /// Pages per site, including the first one.
    pub max_pages: u32,
    /// Upper bound on waiting for the address to change after a click.
    pub settle: Duration,
    /// Scrolling done before detection, to reveal lazily rendered controls.
    pub reveal: ScrollSettings,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            max_pages: 3,
            settle: Duration::from_secs(5),
            reveal: ScrollSettings::new(3, Duration::from_secs(1)),
        }
    }
}

/// Result of one [`PageNavigator::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPageOutcome {
    pub moved: bool,
}

/// Drives one listing page through its pagination.
pub struct PageNavigator {
    config: NavigatorConfig,
    strategies: Vec<NextPageStrategy>,
    current_page: u32,
}

impl PageNavigator {
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            config,
            strategies: NextPageStrategy::CHAIN.to_vec(),
            current_page: 1,
        }
    }

    /// Replace the detection chain. Strategies are tried in the given order.
    pub fn with_strategies(mut self, strategies: Vec<NextPageStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    /// Start counting pages again for a new site.
    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Move to the next page if there is one.
    ///
    /// Exhausted pagination is an expected outcome, so every failure here
    /// degrades to `moved: false`.
    pub async fn advance<P: Page>(&mut self, page: &P) -> NextPageOutcome {
        tracing::info!(page = self.current_page, "Attempting to navigate to next page");

        if self.current_page >= self.config.max_pages {
            tracing::info!(max_pages = self.config.max_pages, "Reached maximum pages limit");
            return NextPageOutcome { moved: false };
        }

        match self.try_advance(page).await {
            Ok(moved) => NextPageOutcome { moved },
            Err(e) => {
                tracing::warn!(error = %e, "Error navigating to next page");
                NextPageOutcome { moved: false }
            }
        }
    }

    async fn try_advance<P: Page>(&mut self, page: &P) -> Result<bool, AppError> {
        if let Err(e) = scroll_page_to_end(page, self.config.reveal).await {
            tracing::debug!(error = %e, "Error scrolling to bottom");
        }

        let Some(control) = self.find_next_control(page).await else {
            tracing::info!("No next page found");
            return Ok(false);
        };

        let before = page.current_url().await?;
        control.click().await?;
        self.wait_for_settle(page, &before).await;

        self.current_page += 1;
        tracing::info!(page = self.current_page, "Moved to next page");
        Ok(true)
    }

    async fn find_next_control<P: Page>(&self, page: &P) -> Option<P::Element> {
        for strategy in &self.strategies {
            if let Some(element) = strategy.locate(page).await {
                tracing::info!(strategy = strategy.name(), "Found next page control");
                return Some(element);
            }
        }
        None
    }

    /// Wait until the address changes or the settle delay runs out.
    /// AJAX pagination never changes the address, so the timeout is normal.
    async fn wait_for_settle<P: Page>(&self, page: &P, before: &str) {
        let changed = async {
            loop {
                if let Ok(url) = page.current_url().await
                    && url != before
                {
                    return url;
                }
                tokio::time::sleep(URL_POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(self.config.settle, changed).await {
            Ok(url) => tracing::debug!(%url, "Address changed"),
            Err(_) => tracing::debug!("Settled without address change"),
        }
    }
}
