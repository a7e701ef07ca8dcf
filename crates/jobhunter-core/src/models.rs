use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relevance of a posting as judged by the classifier.
///
/// Ordering for filtering goes through [`RelevanceStatus::rank`], never
/// through the declaration order of the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceStatus {
    Yes,
    Maybe,
    No,
    Duplicate,
    Unknown,
    All,
}

impl RelevanceStatus {
    /// Lower rank means more relevant.
    pub fn rank(&self) -> u8 {
        match self {
            RelevanceStatus::Yes => 1,
            RelevanceStatus::Maybe => 2,
            RelevanceStatus::No => 3,
            RelevanceStatus::Duplicate => 4,
            RelevanceStatus::Unknown => 5,
            RelevanceStatus::All => 6,
        }
    }

    /// True when a posting with this status passes a filter at `threshold`.
    pub fn within(&self, threshold: RelevanceStatus) -> bool {
        self.rank() <= threshold.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelevanceStatus::Yes => "yes",
            RelevanceStatus::Maybe => "maybe",
            RelevanceStatus::No => "no",
            RelevanceStatus::Duplicate => "duplicate",
            RelevanceStatus::Unknown => "unknown",
            RelevanceStatus::All => "all",
        }
    }

    /// Upper-case name used in user-facing messages.
    pub fn name(&self) -> &'static str {
        match self {
            RelevanceStatus::Yes => "YES",
            RelevanceStatus::Maybe => "MAYBE",
            RelevanceStatus::No => "NO",
            RelevanceStatus::Duplicate => "DUPLICATE",
            RelevanceStatus::Unknown => "UNKNOWN",
            RelevanceStatus::All => "ALL",
        }
    }

    /// Lenient mapping for classifier output. Anything unrecognized,
    /// including `"all"`, becomes [`RelevanceStatus::Unknown`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "yes" => RelevanceStatus::Yes,
            "maybe" => RelevanceStatus::Maybe,
            "no" => RelevanceStatus::No,
            "duplicate" => RelevanceStatus::Duplicate,
            _ => RelevanceStatus::Unknown,
        }
    }
}

impl fmt::Display for RelevanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Strict parsing, used for configured thresholds.
impl FromStr for RelevanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(RelevanceStatus::Yes),
            "maybe" => Ok(RelevanceStatus::Maybe),
            "no" => Ok(RelevanceStatus::No),
            "duplicate" => Ok(RelevanceStatus::Duplicate),
            "unknown" => Ok(RelevanceStatus::Unknown),
            "all" => Ok(RelevanceStatus::All),
            _ => Err(format!("Unknown relevance status: {}", s)),
        }
    }
}

/// A single discovered job listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Run-scoped identifier.
    pub id: String,
    pub title: String,
    pub company: String,
    /// Durable identity across runs.
    pub url: String,
    /// Listing page the posting was found on.
    pub source_url: String,
    pub found_at: DateTime<Utc>,
    pub relevance: RelevanceStatus,
    pub reason: String,
}

impl Posting {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            company: company.into(),
            url: url.into(),
            source_url: source_url.into(),
            found_at: Utc::now(),
            relevance: RelevanceStatus::Unknown,
            reason: "Unknown".to_string(),
        }
    }

    pub fn with_relevance(mut self, relevance: RelevanceStatus, reason: impl Into<String>) -> Self {
        self.relevance = relevance;
        self.reason = reason.into();
        self
    }
}

impl fmt::Display for Posting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} at {} ({})", self.id, self.title, self.company, self.url)
    }
}

/// What a run selected for delivery, plus the counters shown in the header.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    postings: Vec<Posting>,
    pub total_found: usize,
    pub deferred_count: usize,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(postings: Vec<Posting>, total_found: usize) -> Self {
        Self {
            postings,
            total_found,
            deferred_count: 0,
            notes: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_deferred(mut self, deferred_count: usize) -> Self {
        self.deferred_count = deferred_count;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Always equal to the number of selected postings.
    pub fn filtered_count(&self) -> usize {
        self.postings.len()
    }

    /// Postings found but not selected.
    pub fn excluded_count(&self) -> usize {
        self.total_found.saturating_sub(self.filtered_count())
    }
}

/// Output of the segmenter: a header plus ordered, length-bounded parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentSet {
    pub header: String,
    pub parts: Vec<String>,
}

impl SegmentSet {
    /// A message that is just a single part, used for error reports.
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            header: String::new(),
            parts: vec![text.into()],
        }
    }
}
