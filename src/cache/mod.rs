//! Content-hash–keyed processing cache.
//!
//! Decides whether a file needs (re)processing and persists run metadata
//! between invocations. The cache is one YAML document in the cache
//! directory mapping a caller-supplied key (default: the file path) to the
//! content hash, artifact location, and outcome of the last run.
//!
//! A file is reprocessed iff its current content hash differs from the
//! stored hash, the key is absent, or caching is disabled. Entries are
//! written on success and on "no dependencies found" — never when the file
//! errored, so failed files stay eligible for retry on the next run.

mod hash;

pub use hash::{hash_bytes, hash_file};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File name of the cache document inside the cache directory.
const CACHE_FILE: &str = "processed_files.yaml";

/// Errors that can occur persisting the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Outcome recorded for a processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Success,
    NoDependenciesFound,
}

/// Metadata for one processed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hex SHA-256 of the file's raw bytes at processing time.
    pub hash: String,
    /// Artifact location, absent when nothing was extracted.
    pub yaml_path: Option<PathBuf>,
    pub status: CacheStatus,
}

/// The skip decision for one file.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    /// Cache hit with matching content hash.
    Skip(CacheEntry),
    /// Needs processing, with the reason for the decision.
    Process(&'static str),
}

/// Cache of processed files, loaded once per run and rewritten on every
/// recorded entry.
pub struct ProcessCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    enabled: bool,
}

impl ProcessCache {
    /// Load the cache document from `cache_dir`, tolerating a missing or
    /// unreadable file (both yield an empty cache). With `enabled` false
    /// nothing is read and every decision is `Process`.
    pub fn load(cache_dir: &Path, enabled: bool) -> Self {
        let path = cache_dir.join(CACHE_FILE);
        let entries = if enabled {
            match fs::read_to_string(&path) {
                Ok(content) => match serde_yaml::from_str(&content) {
                    Ok(entries) => entries,
                    Err(err) => {
                        warn!(error = %err, "cache file unparseable, starting empty");
                        BTreeMap::new()
                    }
                },
                Err(_) => BTreeMap::new(),
            }
        } else {
            BTreeMap::new()
        };

        debug!(entries = entries.len(), enabled, "cache loaded");
        Self {
            path,
            entries,
            enabled,
        }
    }

    /// Decide whether the file behind `key` needs processing given its
    /// current content hash.
    pub fn decide(&self, key: &str, content_hash: &str) -> CacheDecision {
        if !self.enabled {
            return CacheDecision::Process("cache disabled");
        }
        match self.entries.get(key) {
            None => CacheDecision::Process("file not in cache"),
            Some(entry) if entry.hash == content_hash => CacheDecision::Skip(entry.clone()),
            Some(_) => CacheDecision::Process("file content changed"),
        }
    }

    /// Record an entry and rewrite the cache document.
    pub fn record(&mut self, key: impl Into<String>, entry: CacheEntry) -> CacheResult<()> {
        self.entries.insert(key.into(), entry);
        self.save()
    }

    fn save(&self) -> CacheResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(&self.entries)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
