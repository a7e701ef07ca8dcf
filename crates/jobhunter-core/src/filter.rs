use crate::error::AppError;
use crate::models::{Posting, RelevanceStatus};

/// Keeps postings whose relevance ranks at or above a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelevanceFilter {
    threshold: RelevanceStatus,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(RelevanceStatus::Maybe)
    }
}

impl RelevanceFilter {
    pub fn new(threshold: RelevanceStatus) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> RelevanceStatus {
        self.threshold
    }

    /// Order-preserving subset of `postings` within the threshold.
    pub fn select(&self, postings: Vec<Posting>) -> Result<Vec<Posting>, AppError> {
        if postings.is_empty() {
            return Err(AppError::InvalidInput("No postings to filter".into()));
        }

        let total = postings.len();
        let selected: Vec<Posting> = postings
            .into_iter()
            .filter(|p| p.relevance.within(self.threshold))
            .collect();

        tracing::info!(
            selected = selected.len(),
            total,
            threshold = %self.threshold,
            "Filtered postings by relevance"
        );
        Ok(selected)
    }
}
