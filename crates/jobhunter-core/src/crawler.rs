use crate::error::AppError;
use crate::extract::PostingExtractor;
use crate::models::Posting;
use crate::navigator::PageNavigator;
use crate::traits::Page;

/// Walks every target site page by page and collects postings.
pub struct Crawler {
    targets: Vec<String>,
    navigator: PageNavigator,
    extractor: PostingExtractor,
}

impl Crawler {
    pub fn new(targets: Vec<String>, navigator: PageNavigator, extractor: PostingExtractor) -> Self {
        Self {
            targets,
            navigator,
            extractor,
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Crawl all targets in order. The first failing site fails the crawl.
    ///
    /// A link is reported once per crawl, on the first page it appears.
    pub async fn crawl<P: Page>(&mut self, page: &P) -> Result<Vec<Posting>, AppError> {
        let mut postings = Vec::new();
        self.extractor.reset();

        for (index, url) in self.targets.iter().enumerate() {
            tracing::info!(site = index + 1, total = self.targets.len(), %url, "Processing site");

            page.navigate(url)
                .await
                .map_err(|e| AppError::Discovery(format!("Failed to load {url}: {e}")))?;
            self.navigator.reset();

            let before = postings.len();
            loop {
                postings.extend(self.extractor.extract(page).await?);
                if !self.navigator.advance(page).await.moved {
                    break;
                }
            }

            tracing::info!(
                %url,
                found = postings.len() - before,
                pages = self.navigator.current_page(),
                "Site done"
            );
        }

        tracing::info!(total = postings.len(), "Crawl finished");
        for (i, posting) in postings.iter().enumerate() {
            tracing::info!("  {}. {} at {}", i + 1, posting.title, posting.company);
        }
        Ok(postings)
    }
}
