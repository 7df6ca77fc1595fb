//! Content-addressed cache of review results
//!
//! Entries live one-per-fingerprint as JSON files under the configured
//! directory. Writes go to a temp file in the same directory and are
//! renamed into place, so a crash mid-write never leaves a readable
//! partial entry. Expired or corrupt entries are treated as absent and
//! removed on sight.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::changeset::FileChange;
use crate::comment::VerifiedComment;
use crate::{Error, Result};

/// Bump to invalidate every previously cached review
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Deterministic cache key over file identity, diff content, tool versions
/// and the review-relevant configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for one file change
    ///
    /// `tool_ids` names the analyzers that would run for this file and
    /// `config_inputs` the review settings that shape the output; either
    /// changing must produce a different fingerprint.
    pub fn compute(change: &FileChange, tool_ids: &[String], config_inputs: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_SCHEMA_VERSION.to_le_bytes());
        hasher.update(change.path.as_bytes());
        hasher.update([0]);
        hasher.update(change.diff.as_bytes());
        hasher.update([0]);
        for tool in tool_ids {
            hasher.update(tool.as_bytes());
            hasher.update([0]);
        }
        for input in config_inputs {
            hasher.update(input.as_bytes());
            hasher.update([0]);
        }
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push_str(&format!("{:02x}", byte));
        }
        Fingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached review result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Layout version; entries from older layouts are discarded
    pub schema: u32,
    /// When the entry was committed
    pub created_at: DateTime<Utc>,
    /// Time-to-live at commit time
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// The verified comments, in published order
    pub comments: Vec<VerifiedComment>,
}

impl CacheEntry {
    fn new(comments: Vec<VerifiedComment>, ttl: Duration) -> Self {
        Self {
            schema: CACHE_SCHEMA_VERSION,
            created_at: Utc::now(),
            ttl,
            comments,
        }
    }

    /// Whether the entry has outlived its TTL at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age > ttl,
            Err(_) => false,
        }
    }
}

/// File-backed cache store with an explicit lifecycle
///
/// Opened at run start, injected into the orchestrator, shared read-only
/// between worker pipelines. Never ambient state.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    /// Open (creating if needed) the cache directory
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(Error::Io)?;
        Ok(Self { dir, ttl })
    }

    /// Look up a cached review; expired and corrupt entries read as absent
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let path = self.entry_path(fingerprint);
        let contents = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Removing corrupt cache entry");
                let _ = fs::remove_file(&path);
                return None;
            }
        };

        if entry.schema != CACHE_SCHEMA_VERSION {
            tracing::debug!(
                path = %path.display(),
                schema = entry.schema,
                "Removing cache entry from older schema"
            );
            let _ = fs::remove_file(&path);
            return None;
        }

        if entry.is_expired(Utc::now()) {
            tracing::debug!(fingerprint = %fingerprint, "Cache entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        Some(entry)
    }

    /// Commit a review result atomically
    ///
    /// The entry is serialized to a temp file beside its final location and
    /// renamed into place; readers only ever observe complete entries.
    pub fn put(&self, fingerprint: &Fingerprint, comments: Vec<VerifiedComment>) -> Result<()> {
        let entry = CacheEntry::new(comments, self.ttl);
        let final_path = self.entry_path(fingerprint);
        let tmp_path = final_path.with_extension("json.tmp");

        let contents = serde_json::to_string_pretty(&entry).map_err(Error::Json)?;
        fs::write(&tmp_path, contents).map_err(Error::Io)?;
        fs::rename(&tmp_path, &final_path).map_err(Error::Io)?;

        tracing::debug!(fingerprint = %fingerprint, "Cached review result");
        Ok(())
    }

    /// Remove every entry past its TTL; returns the number removed
    ///
    /// Unreadable entries count as expired. Safe to run while `get` is in
    /// use: a concurrent reader either sees the file or an absence.
    pub fn evict_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.dir).map_err(Error::Io)? {
            let path = dir_entry.map_err(Error::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let expired = match fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str::<CacheEntry>(&c).ok())
            {
                Some(entry) => entry.schema != CACHE_SCHEMA_VERSION || entry.is_expired(now),
                None => true,
            };

            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Evicted expired cache entries");
        }
        Ok(removed)
    }

    /// Remove every entry regardless of age; returns the number removed
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.dir).map_err(Error::Io)? {
            let path = dir_entry.map_err(Error::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && fs::remove_file(&path).is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Cache directory this store reads and writes
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ChangeKind;
    use crate::comment::{CommentOrigin, Severity};
    use tempfile::TempDir;

    fn change(diff: &str) -> FileChange {
        FileChange::new("src/auth.py", ChangeKind::Modified, diff, "base", "head")
    }

    fn comment(line: u32) -> VerifiedComment {
        VerifiedComment {
            path: "src/auth.py".into(),
            line,
            severity: Severity::Major,
            message: "possible issue".into(),
            suggestion: None,
            rule: None,
            origin: CommentOrigin::AiOnly,
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let c = change("@@ -1 +1,2 @@\n+x");
        let tools = vec!["pylint".to_string()];
        let cfg = vec!["model=m".to_string()];
        assert_eq!(
            Fingerprint::compute(&c, &tools, &cfg),
            Fingerprint::compute(&c, &tools, &cfg)
        );
    }

    #[test]
    fn test_fingerprint_changes_with_diff() {
        let tools = vec!["pylint".to_string()];
        let cfg = vec!["model=m".to_string()];
        let a = Fingerprint::compute(&change("+x"), &tools, &cfg);
        let b = Fingerprint::compute(&change("+y"), &tools, &cfg);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_config_and_tools() {
        let c = change("+x");
        let base = Fingerprint::compute(&c, &["pylint".into()], &["model=m".into()]);
        let new_tool = Fingerprint::compute(&c, &["pylint-3".into()], &["model=m".into()]);
        let new_cfg = Fingerprint::compute(&c, &["pylint".into()], &["model=other".into()]);
        assert_ne!(base, new_tool);
        assert_ne!(base, new_cfg);
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::open(tmp.path(), Duration::from_secs(3600)).unwrap();
        let fp = Fingerprint::compute(&change("+x"), &[], &[]);

        store.put(&fp, vec![comment(3), comment(7)]).unwrap();
        let entry = store.get(&fp).expect("entry present");
        assert_eq!(entry.comments.len(), 2);
        assert_eq!(entry.comments[0].line, 3);
        assert_eq!(entry.comments[1].line, 7);
    }

    #[test]
    fn test_get_absent() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::open(tmp.path(), Duration::from_secs(3600)).unwrap();
        let fp = Fingerprint::compute(&change("+x"), &[], &[]);
        assert!(store.get(&fp).is_none());
    }

    #[test]
    fn test_expired_entry_reads_absent() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::open(tmp.path(), Duration::from_secs(0)).unwrap();
        let fp = Fingerprint::compute(&change("+x"), &[], &[]);
        store.put(&fp, vec![comment(3)]).unwrap();

        // Zero TTL: anything older than "now" is expired.
        std::thread::sleep(Duration::from_millis(10));
        assert!(store.get(&fp).is_none());
        // And the file is gone afterwards.
        assert!(!store.dir().join(format!("{}.json", fp)).exists());
    }

    #[test]
    fn test_corrupt_entry_reads_absent() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::open(tmp.path(), Duration::from_secs(3600)).unwrap();
        let fp = Fingerprint::compute(&change("+x"), &[], &[]);
        fs::write(store.dir().join(format!("{}.json", fp)), "{not json").unwrap();
        assert!(store.get(&fp).is_none());
    }

    #[test]
    fn test_evict_expired() {
        let tmp = TempDir::new().unwrap();
        let expired = CacheStore::open(tmp.path(), Duration::from_secs(0)).unwrap();
        let live = CacheStore::open(tmp.path(), Duration::from_secs(3600)).unwrap();

        let fp_old = Fingerprint::compute(&change("+old"), &[], &[]);
        let fp_new = Fingerprint::compute(&change("+new"), &[], &[]);
        expired.put(&fp_old, vec![comment(1)]).unwrap();
        live.put(&fp_new, vec![comment(2)]).unwrap();

        std::thread::sleep(Duration::from_millis(10));
        let removed = live.evict_expired().unwrap();
        assert_eq!(removed, 1);
        assert!(live.get(&fp_new).is_some());
    }

    #[test]
    fn test_clear_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::open(tmp.path(), Duration::from_secs(3600)).unwrap();
        store
            .put(&Fingerprint::compute(&change("+a"), &[], &[]), vec![comment(1)])
            .unwrap();
        store
            .put(&Fingerprint::compute(&change("+b"), &[], &[]), vec![comment(2)])
            .unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store
            .get(&Fingerprint::compute(&change("+a"), &[], &[]))
            .is_none());
    }

    #[test]
    fn test_no_partial_writes_visible() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::open(tmp.path(), Duration::from_secs(3600)).unwrap();
        let fp = Fingerprint::compute(&change("+x"), &[], &[]);
        store.put(&fp, vec![comment(1)]).unwrap();

        // The temp file never survives a successful commit.
        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
