// src/cache.rs - per-key TTL cache of JSON blobs on disk
use anyhow::{Context, Result};
use chrono::Utc;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Each entry lives in its own file named by a hash of its logical key, so
/// interleaved writers never contend on a shared file and no lock is
/// needed. Writes are whole-file overwrites.
pub struct FileCache {
    dir: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    /// Milliseconds since the epoch, for TTL expiry.
    timestamp: i64,
    data: serde_json::Value,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache directory {:?}", dir))?;
        Ok(FileCache { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(&digest[..16])))
    }

    pub fn put<T: Serialize>(&self, key: &str, data: &T) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            data: serde_json::to_value(data).context("serializing cache entry")?,
        };
        let body = serde_json::to_string(&entry).context("encoding cache entry")?;
        fs::write(self.entry_path(key), body)
            .with_context(|| format!("writing cache entry '{}'", key))?;
        Ok(())
    }

    /// A cached value no older than `max_age`, if present and readable.
    pub fn get<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let entry = self.read_entry(key)?;
        let age_ms = Utc::now().timestamp_millis().saturating_sub(entry.timestamp);
        if age_ms < 0 || age_ms as u128 > max_age.as_millis() {
            debug!("cache entry '{}' is stale ({} ms old)", key, age_ms);
            return None;
        }
        serde_json::from_value(entry.data).ok()
    }

    /// A cached value of any age. The fallback when a source fetch fails:
    /// stale data beats no data.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.read_entry(key)?;
        serde_json::from_value(entry.data).ok()
    }

    fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let body = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&body) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("unreadable cache entry at {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
