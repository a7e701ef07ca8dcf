//! Run configuration loaded from a TOML file.
//!
//! Every key is optional; missing keys fall back to the defaults below.
//! The loaded configuration is validated before use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::RelevanceStatus;

/// Base prompts longer than this are flagged in the run notes.
pub const BASE_PROMPT_CHAR_LIMIT: usize = 2000;

pub const DEFAULT_BASE_PROMPT: &str = r#"You are a job relevance analyzer for computer science graduates. Analyze each job posting (url, title, company) and decide whether it is relevant.

Look at the technical content of the role (languages, tools, frameworks, CS concepts), its responsibilities (software development, system design, data, ML, testing) and the experience it asks for.

RELEVANCE RULES:
- YES: technical role and junior / entry-level / graduate / 0-1 years of experience
- MAYBE: technical role asking for 2+ years of experience
- NO: non-technical role (sales, marketing, HR, finance, operations)

OUTPUT FORMAT:
Return a JSON array with exactly this structure, one object per job id:
[
  {"id": "0", "relevant": "yes", "reason": "Junior software engineer position"},
  {"id": "1", "relevant": "maybe", "reason": "Requires 3 years but CS field"},
  {"id": "2", "relevant": "no", "reason": "Marketing position, not technical"}
]
"#;

fn default_keywords() -> Vec<String> {
    ["engineer", "graduate", "junior", "software engineer"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excluded_keywords() -> Vec<String> {
    ["senior", "marketing", "sales", "hr", "finance", "operations"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Settings for one run of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Listing pages to crawl.
    pub targets: Vec<String>,
    /// A posting title must contain at least one of these.
    pub keywords: Vec<String>,
    /// A posting title must contain none of these.
    pub excluded_keywords: Vec<String>,
    pub max_pages_per_site: u32,
    pub batch_size: usize,
    pub batch_delay_secs: u64,
    /// Postings beyond this cap are deferred to the next run.
    pub max_postings_per_run: usize,
    pub retention_days: u32,
    /// Lowest relevance that still gets reported (`yes`, `maybe`, ..., `all`).
    pub threshold: String,
    pub scroll_pause_ms: u64,
    /// How long to wait for the address to change after clicking "next".
    pub page_settle_ms: u64,
    pub storage_path: PathBuf,
    pub base_prompt: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            keywords: default_keywords(),
            excluded_keywords: default_excluded_keywords(),
            max_pages_per_site: 3,
            batch_size: 15,
            batch_delay_secs: 6,
            max_postings_per_run: 150,
            retention_days: 30,
            threshold: "maybe".to_string(),
            scroll_pause_ms: 2000,
            page_settle_ms: 5000,
            storage_path: PathBuf::from("data/sent_jobs.json"),
            base_prompt: DEFAULT_BASE_PROMPT.to_string(),
        }
    }
}

impl RunConfig {
    /// Load and validate a configuration file.
    ///
    /// A missing file yields the defaults, which still have to validate.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file without validating it.
    pub fn read(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse without validating.
    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::ConfigError(format!("Invalid TOML: {e}")))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.targets.is_empty() {
            return Err(AppError::ConfigError(
                "At least one target URL is required".into(),
            ));
        }
        for target in &self.targets {
            url::Url::parse(target)
                .map_err(|e| AppError::ConfigError(format!("Invalid target '{target}': {e}")))?;
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::ConfigError(
                "At least one include keyword is required".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::ConfigError("batch_size must be at least 1".into()));
        }
        if self.max_postings_per_run == 0 {
            return Err(AppError::ConfigError(
                "max_postings_per_run must be at least 1".into(),
            ));
        }
        if self.max_pages_per_site == 0 {
            return Err(AppError::ConfigError(
                "max_pages_per_site must be at least 1".into(),
            ));
        }
        if self.retention_days == 0 {
            return Err(AppError::ConfigError(
                "retention_days must be at least 1".into(),
            ));
        }
        self.threshold()?;
        Ok(())
    }

    pub fn threshold(&self) -> Result<RelevanceStatus, AppError> {
        self.threshold
            .parse()
            .map_err(|e: String| AppError::ConfigError(e))
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    pub fn retention(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::days(i64::from(self.retention_days))
    }

    /// Warning text when the base prompt exceeds the recommended length.
    pub fn base_prompt_warning(&self) -> Option<String> {
        let len = self.base_prompt.chars().count();
        (len > BASE_PROMPT_CHAR_LIMIT).then(|| {
            format!("Base prompt is {len} characters (recommended: {BASE_PROMPT_CHAR_LIMIT})")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RunConfig::from_toml_str(
            r#"
            targets = ["https://copyleaks.com/careers"]
            batch_size = 5
            threshold = "yes"
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 5);
        assert_eq!(config.threshold().unwrap(), RelevanceStatus::Yes);
        assert_eq!(config.max_pages_per_site, 3);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.batch_delay(), Duration::from_secs(6));
        assert!(config.keywords.contains(&"engineer".to_string()));
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = RunConfig::from_toml_str("targetz = []").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = RunConfig::default();
        assert!(config.validate().is_err(), "no targets");

        config.targets = vec!["https://acme.com/jobs".into()];
        config.validate().unwrap();

        config.batch_size = 0;
        assert!(config.validate().is_err());
        config.batch_size = 15;

        config.threshold = "sometimes".into();
        assert!(config.validate().is_err());
        config.threshold = "all".into();
        config.validate().unwrap();

        config.targets = vec!["not a url".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "targets = [\"https://acme.com/careers\"]\nretention_days = 7"
        )
        .unwrap();

        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.retention(), chrono::TimeDelta::days(7));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_read_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::read(&dir.path().join("missing.toml")).unwrap();
        assert!(config.targets.is_empty());
        assert_eq!(config.storage_path, PathBuf::from("data/sent_jobs.json"));
    }

    #[test]
    fn test_base_prompt_warning() {
        let mut config = RunConfig::default();
        assert!(config.base_prompt_warning().is_none());
        config.base_prompt = "x".repeat(BASE_PROMPT_CHAR_LIMIT + 1);
        assert!(config.base_prompt_warning().unwrap().contains("2001"));
    }
}
