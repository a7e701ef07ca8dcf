//! Packing a run summary into length-bounded messages.

use std::fmt::Write;

use crate::error::AppError;
use crate::models::{Posting, RunSummary, SegmentSet};
use crate::util::truncate_at_boundary;

/// Room left in every part for the delivery layer's `Part i/n` prefix
/// and the trailing footer.
pub const SAFETY_PADDING: usize = 200;

const FOOTER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Split `summary` into a header and parts of at most `max_length` bytes.
///
/// Postings are packed greedily in order; the `Generated:` footer goes on
/// the last part only.
pub fn segment(summary: &RunSummary, max_length: usize) -> Result<SegmentSet, AppError> {
    if max_length <= SAFETY_PADDING {
        return Err(AppError::InvalidInput(format!(
            "Message length {max_length} leaves no room after {SAFETY_PADDING} bytes of padding"
        )));
    }
    let budget = max_length - SAFETY_PADDING;

    let header = build_header(summary);
    let header = truncate_at_boundary(&header, max_length).to_string();

    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, posting) in summary.postings().iter().enumerate() {
        let block = format_block(i + 1, posting);
        let block = truncate_at_boundary(&block, budget);

        if current.len() + block.len() + SAFETY_PADDING > max_length {
            if !current.is_empty() {
                parts.push(current.trim().to_string());
            }
            current = block.to_string();
        } else {
            current.push_str(block);
        }
    }
    if !current.is_empty() {
        parts.push(current.trim().to_string());
    }

    if let Some(last) = parts.last_mut() {
        let _ = write!(
            last,
            "\n\nGenerated: {}",
            summary.timestamp.format(FOOTER_TIME_FORMAT)
        );
    }

    tracing::debug!(parts = parts.len(), max_length, "Summary segmented");
    Ok(SegmentSet { header, parts })
}

fn build_header(summary: &RunSummary) -> String {
    let mut header = String::from("JobHunter Results Summary\n");
    let _ = writeln!(header, "Total jobs found: {}", summary.total_found);
    let _ = writeln!(header, "Relevant jobs: {}", summary.filtered_count());
    let _ = writeln!(header, "Filtered out: {}", summary.excluded_count());
    if summary.deferred_count > 0 {
        let _ = writeln!(header, "Deferred to next run: {}", summary.deferred_count);
    }
    if !summary.notes.trim().is_empty() {
        let _ = writeln!(header, "{}", summary.notes.trim_end());
    }
    header.push_str("Job Matches:\n");
    header
}

fn format_block(ordinal: usize, posting: &Posting) -> String {
    format!(
        "\n{ordinal}. {} at {}\nrelevant: {}\nreason: {}\nurl: {}\n",
        posting.title,
        posting.company,
        posting.relevance.name(),
        posting.reason,
        posting.url
    )
}
