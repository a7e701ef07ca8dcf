//! Persisted record of postings already delivered to the user.
//!
//! Backed by a single JSON file:
//!
//! ```json
//! {
//!   "sent_job_urls": { "https://acme.com/jobs/1": "2026-10-01T09:00:00+00:00" },
//!   "last_updated": "2026-10-01T09:00:00+00:00"
//! }
//! ```
//!
//! Every mutation is written through immediately. Writes go to a sibling
//! temporary file which is then renamed over the original, so a crash during
//! persist leaves either the old or the new record on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Posting;

#[derive(Debug, Serialize, Deserialize)]
struct DedupFile {
    #[serde(default)]
    sent_job_urls: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// Delivered-url store with time-based expiry.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    retention: TimeDelta,
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl DedupStore {
    /// Load the store from `path` and prune expired entries.
    ///
    /// A missing or corrupt file starts an empty store. Fails only if pruning
    /// removed entries and the result could not be persisted.
    pub fn open(path: impl Into<PathBuf>, retention: TimeDelta) -> Result<Self, AppError> {
        Self::open_at(path, retention, Utc::now())
    }

    pub(crate) fn open_at(
        path: impl Into<PathBuf>,
        retention: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let path = path.into();
        let entries = Self::load_entries(&path, now);
        tracing::info!(path = %path.display(), entries = entries.len(), "Loaded dedup store");

        let mut store = Self {
            path,
            retention,
            entries,
        };
        store.prune_expired_at(now)?;
        Ok(store)
    }

    fn load_entries(path: &Path, now: DateTime<Utc>) -> BTreeMap<String, DateTime<Utc>> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Dedup file not found, starting empty");
                return BTreeMap::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read dedup file, starting empty");
                return BTreeMap::new();
            }
        };

        let file: DedupFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt dedup file, starting empty");
                return BTreeMap::new();
            }
        };

        file.sent_job_urls
            .into_iter()
            .filter_map(|(url, raw)| match parse_timestamp(&raw) {
                Some(ts) => Some((url, ts.min(now))),
                None => {
                    tracing::warn!(%url, timestamp = %raw, "Dropping entry with bad timestamp");
                    None
                }
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_delivered(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Entries sorted newest first.
    pub fn entries(&self) -> Vec<(&str, DateTime<Utc>)> {
        let mut list: Vec<_> = self
            .entries
            .iter()
            .map(|(url, ts)| (url.as_str(), *ts))
            .collect();
        list.sort_by(|a, b| b.1.cmp(&a.1));
        list
    }

    /// Postings whose url has not been delivered yet, in input order.
    pub fn filter_undelivered(&self, postings: Vec<Posting>) -> Vec<Posting> {
        let initial = postings.len();
        let fresh: Vec<Posting> = postings
            .into_iter()
            .filter(|p| !self.is_delivered(&p.url))
            .collect();

        let duplicates = initial - fresh.len();
        if duplicates > 0 {
            tracing::info!(duplicates, "Filtered out already delivered postings");
        }
        tracing::info!(new = fresh.len(), "New postings found");
        fresh
    }

    /// Record the postings as delivered now and persist.
    pub fn mark_delivered(&mut self, postings: &[Posting]) -> Result<(), AppError> {
        self.mark_delivered_at(postings, Utc::now())
    }

    pub(crate) fn mark_delivered_at(
        &mut self,
        postings: &[Posting],
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if postings.is_empty() {
            tracing::warn!("No postings to mark as delivered");
            return Ok(());
        }

        let mut marked = 0;
        for posting in postings.iter().filter(|p| !p.url.is_empty()) {
            self.entries.insert(posting.url.clone(), now);
            marked += 1;
        }
        tracing::info!(marked, "Marked postings as delivered");

        self.prune_expired_at(now)?;
        self.persist(now)
    }

    /// Drop entries older than the retention window. Persists if anything
    /// was removed. Returns the number of removed entries.
    pub fn prune_expired(&mut self) -> Result<usize, AppError> {
        self.prune_expired_at(Utc::now())
    }

    pub(crate) fn prune_expired_at(&mut self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let cutoff = now - self.retention;
        let before = self.entries.len();
        self.entries.retain(|_, ts| *ts > cutoff);
        let removed = before - self.entries.len();

        if removed > 0 {
            tracing::info!(
                removed,
                retention_days = self.retention.num_days(),
                "Removed expired entries"
            );
            self.persist(now)?;
        }
        Ok(removed)
    }

    fn persist(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        let file = DedupFile {
            sent_job_urls: self
                .entries
                .iter()
                .map(|(url, ts)| (url.clone(), ts.to_rfc3339()))
                .collect(),
            last_updated: Some(now.to_rfc3339()),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let tmp = self.tmp_path();
        let write = || -> std::io::Result<()> {
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
            std::fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            AppError::Storage(format!("Failed to persist {}: {e}", self.path.display()))
        })?;

        tracing::debug!(entries = self.entries.len(), "Persisted dedup store");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "dedup".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// RFC 3339, or an ISO-8601 timestamp without offset read as local time.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|ts| ts.with_timezone(&Utc))
}
