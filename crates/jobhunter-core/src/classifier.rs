//! Batch relevance classification through a text generator.
//!
//! The generator answers in free text. The JSON array inside it is located
//! by fence markers and bracket depth, then merged back onto the batch.
//!
//! Failure policy per batch:
//! - empty response: logged, batch skipped, later batches still run;
//! - anything unparseable or inconsistent: the whole call fails.

use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::models::{Posting, RelevanceStatus};
use crate::traits::Generator;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub batch_size: usize,
    /// Pause between consecutive batches, not after the last one.
    pub batch_delay: Duration,
    pub base_prompt: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            batch_delay: Duration::from_secs(6),
            base_prompt: crate::config::DEFAULT_BASE_PROMPT.to_string(),
        }
    }
}

/// Batch-relative id as returned by the generator: `"3"` or `3`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(u64),
    Text(String),
}

impl RecordId {
    fn index(&self) -> Option<usize> {
        match self {
            RecordId::Number(n) => usize::try_from(*n).ok(),
            RecordId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One verdict from the generator.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationRecord {
    pub id: RecordId,
    pub relevant: String,
    #[serde(default)]
    pub reason: String,
}

pub struct Classifier<G: Generator> {
    generator: G,
    config: ClassifierConfig,
}

impl<G: Generator> Classifier<G> {
    pub fn new(generator: G, config: ClassifierConfig) -> Self {
        Self { generator, config }
    }

    /// Annotate `postings` in place with relevance and reason.
    ///
    /// Postings of a skipped batch keep their previous relevance.
    pub async fn classify(&self, postings: &mut [Posting]) -> Result<(), AppError> {
        if postings.is_empty() {
            return Ok(());
        }

        let batch_size = self.config.batch_size.max(1);
        let total = postings.len().div_ceil(batch_size);

        for (batch, chunk) in postings.chunks_mut(batch_size).enumerate() {
            tracing::info!(batch = batch + 1, total, size = chunk.len(), "Classifying batch");

            let prompt = build_prompt(&self.config.base_prompt, chunk);
            let response = self.generator.generate(&prompt).await.map_err(|e| {
                AppError::Classification(format!("Generator request failed: {e}"))
            })?;

            if response.trim().is_empty() {
                tracing::warn!(batch = batch + 1, "Empty response from generator, skipping batch");
            } else {
                let records = parse_records(&response)?;
                apply_records(chunk, &records)?;
                tracing::debug!(batch = batch + 1, records = records.len(), "Batch classified");
            }

            if batch + 1 < total && !self.config.batch_delay.is_zero() {
                tracing::debug!(delay_secs = self.config.batch_delay.as_secs_f64(), "Waiting before next batch");
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        Ok(())
    }
}

/// Prompt for one batch; ids are the positions within the batch.
pub fn build_prompt(base_prompt: &str, batch: &[Posting]) -> String {
    let mut prompt = format!("{base_prompt}\nJobs to analyze:\n\n");
    for (i, posting) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "\nid: {i}:\n  Title: {}\n  Company: {}\n  URL: {}\n",
            posting.title, posting.company, posting.url
        ));
    }
    prompt
}

/// Locate the first balanced JSON array in free text.
///
/// Fenced content wins when present: ```` ```json ```` first, then a plain
/// fence, from the first opening to the last closing marker. Brackets are
/// counted without regard to string literals.
pub fn extract_json_array(text: &str) -> Result<&str, AppError> {
    let text = strip_fence(text);

    let start = text.find('[').ok_or_else(|| {
        AppError::Classification("No JSON array found in generator response".into())
    })?;

    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Err(AppError::Classification(
        "Unbalanced brackets in generator response".into(),
    ))
}

fn strip_fence(text: &str) -> &str {
    let open = text
        .find(JSON_FENCE)
        .map(|i| i + JSON_FENCE.len())
        .or_else(|| text.find(FENCE).map(|i| i + FENCE.len()));

    let Some(open) = open else {
        return text;
    };
    match text[open..].rfind(FENCE) {
        Some(close) => &text[open..open + close],
        None => &text[open..],
    }
}

pub fn parse_records(response: &str) -> Result<Vec<ClassificationRecord>, AppError> {
    let array = extract_json_array(response)?;
    serde_json::from_str(array).map_err(|e| {
        tracing::error!(raw = %array, "Unparseable classification array");
        AppError::Classification(format!("Invalid classification JSON: {e}"))
    })
}

fn apply_records(batch: &mut [Posting], records: &[ClassificationRecord]) -> Result<(), AppError> {
    let len = batch.len();
    for record in records {
        let posting = record
            .id
            .index()
            .and_then(|i| batch.get_mut(i))
            .ok_or_else(|| {
                AppError::Classification(format!(
                    "Record id {} does not match a posting in a batch of {len}",
                    record.id
                ))
            })?;
        posting.relevance = RelevanceStatus::from_label(&record.relevant);
        posting.reason = record.reason.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockGenerator, make_posting};

    fn config(batch_size: usize) -> ClassifierConfig {
        ClassifierConfig {
            batch_size,
            batch_delay: Duration::ZERO,
            base_prompt: "Classify these.".into(),
        }
    }

    fn postings(n: usize) -> Vec<Posting> {
        (1..=n).map(|i| make_posting(i, &format!("Engineer {i}"))).collect()
    }

    #[test]
    fn test_fenced_response_parses() {
        let text = "Here is the result:\n```json\n[{\"id\":\"0\",\"relevant\":\"yes\",\"reason\":\"ok\"}]\n```\nThanks";
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(RelevanceStatus::from_label(&records[0].relevant), RelevanceStatus::Yes);
        assert_eq!(records[0].reason, "ok");
    }

    #[test]
    fn test_bracket_depth_skips_embedded_brackets() {
        let text = r#"Result: [{"id": "0", "relevant": "no", "reason": "array[0] mismatch"}] trailing ] noise"#;
        let array = extract_json_array(text).unwrap();
        assert!(array.ends_with("mismatch\"}]"));
        let records = parse_records(text).unwrap();
        assert_eq!(records[0].reason, "array[0] mismatch");
    }

    #[test]
    fn test_plain_fence_and_numeric_ids() {
        let text = "```\n[{\"id\": 1, \"relevant\": \"MAYBE\"}]\n```";
        let records = parse_records(text).unwrap();
        assert_eq!(records[0].id, RecordId::Number(1));
        assert_eq!(records[0].reason, "");
    }

    #[test]
    fn test_missing_or_unbalanced_array_is_fatal() {
        assert!(matches!(
            extract_json_array("no array here"),
            Err(AppError::Classification(_))
        ));
        assert!(matches!(
            extract_json_array("[{\"id\": \"0\""),
            Err(AppError::Classification(_))
        ));
        assert!(matches!(
            parse_records("[not json]"),
            Err(AppError::Classification(_))
        ));
    }

    #[test]
    fn test_prompt_lists_batch_positions() {
        let prompt = build_prompt("BASE", &postings(2));
        assert!(prompt.starts_with("BASE\nJobs to analyze:"));
        assert!(prompt.contains("id: 0:\n  Title: Engineer 1\n  Company: Acme\n  URL: https://acme.com/jobs/1"));
        assert!(prompt.contains("id: 1:\n  Title: Engineer 2"));
    }

    #[tokio::test]
    async fn test_classify_applies_records_per_batch() {
        let generator = MockGenerator::with_responses(vec![
            Ok(r#"[{"id":"0","relevant":"yes","reason":"junior"},{"id":"1","relevant":"no","reason":"sales"}]"#.into()),
            Ok(r#"[{"id":0,"relevant":"maybe","reason":"3 years"}]"#.into()),
        ]);
        let classifier = Classifier::new(generator.clone(), config(2));
        let mut postings = postings(3);

        classifier.classify(&mut postings).await.unwrap();

        assert_eq!(generator.call_count(), 2);
        assert_eq!(postings[0].relevance, RelevanceStatus::Yes);
        assert_eq!(postings[1].relevance, RelevanceStatus::No);
        assert_eq!(postings[2].relevance, RelevanceStatus::Maybe);
        assert_eq!(postings[2].reason, "3 years");
        // second batch restarts its ids at 0
        assert!(generator.prompts.lock().unwrap()[1].contains("id: 0:\n  Title: Engineer 3"));
    }

    #[tokio::test]
    async fn test_empty_response_skips_batch() {
        let generator = MockGenerator::with_responses(vec![
            Ok("   ".into()),
            Ok(r#"[{"id":"0","relevant":"yes","reason":"ok"}]"#.into()),
        ]);
        let classifier = Classifier::new(generator.clone(), config(1));
        let mut postings = postings(2);

        classifier.classify(&mut postings).await.unwrap();

        assert_eq!(generator.call_count(), 2);
        assert_eq!(postings[0].relevance, RelevanceStatus::Unknown);
        assert_eq!(postings[0].reason, "Unknown");
        assert_eq!(postings[1].relevance, RelevanceStatus::Yes);
    }

    #[tokio::test]
    async fn test_malformed_response_aborts_remaining_batches() {
        let generator = MockGenerator::with_responses(vec![
            Ok("I cannot help with that".into()),
            Ok(r#"[{"id":"0","relevant":"yes","reason":"ok"}]"#.into()),
        ]);
        let classifier = Classifier::new(generator.clone(), config(1));
        let mut postings = postings(2);

        let err = classifier.classify(&mut postings).await.unwrap_err();

        assert!(matches!(err, AppError::Classification(_)));
        assert_eq!(generator.call_count(), 1);
        assert_eq!(postings[1].relevance, RelevanceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_out_of_range_id_is_fatal() {
        let generator = MockGenerator::new(r#"[{"id":"5","relevant":"yes","reason":"?"}]"#);
        let classifier = Classifier::new(generator, config(15));
        let err = classifier.classify(&mut postings(2)).await.unwrap_err();
        assert!(err.to_string().contains("5"));
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_fatal() {
        let generator = MockGenerator::new(r#"[{"id":"first","relevant":"yes"}]"#);
        let classifier = Classifier::new(generator, config(15));
        assert!(classifier.classify(&mut postings(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_generator_error_is_fatal() {
        let generator = MockGenerator::with_error(AppError::RateLimitExceeded);
        let classifier = Classifier::new(generator, config(15));
        let err = classifier.classify(&mut postings(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Classification(_)));
    }

    #[tokio::test]
    async fn test_delay_only_between_batches() {
        let generator = MockGenerator::default();
        let classifier = Classifier::new(
            generator.clone(),
            ClassifierConfig {
                batch_delay: Duration::from_millis(30),
                ..config(1)
            },
        );
        let start = std::time::Instant::now();
        classifier.classify(&mut postings(2)).await.unwrap();

        assert_eq!(generator.call_count(), 2);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
