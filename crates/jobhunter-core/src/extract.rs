//! Harvesting postings from the page currently shown.

use std::collections::HashSet;

use crate::error::AppError;
use crate::models::Posting;
use crate::scroll::{ScrollSettings, scroll_container_to_end, scroll_page_to_end};
use crate::traits::{Page, PageElement};
use crate::util::{company_from_url, contains_any};

/// Scrollable result lists, tried in order.
pub const CONTAINER_SELECTORS: &[&str] = &[
    ".jobs-search-results-list",
    "[role='main']",
    ".job-list",
    ".results-list",
];

/// Link families that usually point at a single posting.
pub const LINK_SELECTORS: &[&str] = &[
    "a[href*='position']",
    "a[href*='career']",
    "a[href*='job']",
    "a[href*='opening']",
    "a[href*='vacancy']",
    "a[href*='opportunity']",
    "a[href*='role']",
];

/// Turns the links on a listing page into keyword-filtered postings.
///
/// Ids and the set of seen links live as long as the extractor (until
/// [`PostingExtractor::reset`]), so a link repeated on a later page or site
/// yields no second posting.
pub struct PostingExtractor {
    keywords: Vec<String>,
    excluded_keywords: Vec<String>,
    scroll: ScrollSettings,
    next_id: usize,
    seen: HashSet<String>,
}

impl PostingExtractor {
    pub fn new(keywords: Vec<String>, excluded_keywords: Vec<String>, scroll: ScrollSettings) -> Self {
        Self {
            keywords,
            excluded_keywords,
            scroll,
            next_id: 1,
            seen: HashSet::new(),
        }
    }

    /// Forget seen links and restart ids at 1.
    pub fn reset(&mut self) {
        self.next_id = 1;
        self.seen.clear();
    }

    /// Title filter: at least one include keyword and no exclude keyword.
    pub fn accepts(&self, title: &str) -> bool {
        contains_any(title, &self.keywords) && !contains_any(title, &self.excluded_keywords)
    }

    pub async fn extract<P: Page>(&mut self, page: &P) -> Result<Vec<Posting>, AppError> {
        let source_url = page
            .current_url()
            .await
            .map_err(|e| AppError::Discovery(format!("Could not read page address: {e}")))?;
        let company = company_from_url(&source_url);

        self.settle(page).await;

        let mut postings = Vec::new();

        for selector in LINK_SELECTORS {
            let links = match page.query_all(selector).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::debug!(%selector, error = %e, "Link query failed");
                    continue;
                }
            };

            for link in links {
                let (text, href) = match read_link(&link).await {
                    Ok(Some(pair)) => pair,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping unreadable element");
                        continue;
                    }
                };
                if !self.seen.insert(href.clone()) {
                    continue;
                }
                if !self.accepts(&text) {
                    continue;
                }

                let id = self.next_id;
                self.next_id += 1;
                postings.push(Posting::new(
                    id.to_string(),
                    text,
                    company.clone(),
                    href,
                    source_url.clone(),
                ));
            }
        }

        tracing::info!(count = postings.len(), url = %source_url, "Extracted postings");
        Ok(postings)
    }

    /// Scroll the results list (or the page) until lazy content stops loading.
    async fn settle<P: Page>(&self, page: &P) {
        for selector in CONTAINER_SELECTORS {
            let Ok(mut found) = page.query_all(selector).await else {
                continue;
            };
            if found.is_empty() {
                continue;
            }
            let container = found.swap_remove(0);
            tracing::debug!(%selector, "Found job container");
            if let Err(e) = scroll_container_to_end(&container, self.scroll).await {
                tracing::debug!(error = %e, "Container scroll failed");
            }
            return;
        }

        if let Err(e) = scroll_page_to_end(page, self.scroll).await {
            tracing::debug!(error = %e, "Page scroll failed");
        }
    }
}

async fn read_link<E: PageElement>(link: &E) -> Result<Option<(String, String)>, AppError> {
    let Some(href) = link.href().await?.filter(|h| !h.trim().is_empty()) else {
        return Ok(None);
    };
    let text = link.text().await?.trim().to_string();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some((text, href)))
}
