//! # Rendered Image Cache
//!
//! A clock image only changes once per minute, so finished PNGs are kept
//! under a key that encodes timezone, orientation and the UTC minute:
//!
//! ```text
//! clock_image:{timezone}:{orientation}:{YYYYMMDDHHMM}
//! ```
//!
//! Two requests in the same minute with the same parameters share a key;
//! the next minute always misses. Each entry is also written with a short
//! TTL so a long-lived store does not accumulate old minutes.
//!
//! ## Backends
//!
//! - [`MemoryCache`]: process-local map, the default
//! - [`FileCache`]: one file per key in a directory; the file modification
//!   time is set to the expiry instant
//!
//! ## Failure Policy
//!
//! A cache that cannot be read or written is treated as a miss. Requests
//! render fresh images instead of failing; only `/health` reports the
//! outage via [`ImageCache::ping`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CacheBackend, CacheConfig};
use crate::Orientation;

const KEY_PREFIX: &str = "clock_image";

#[derive(Error, Debug)]
pub enum CacheError {
    /// Store directory or entry could not be accessed
    #[error("cache IO: {0}")]
    Io(#[from] io::Error),

    /// A writer panicked while holding the lock
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Key/value store for encoded images.
pub trait ImageCache: Send + Sync {
    /// Stored bytes for `key`, or `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `bytes` under `key` for `ttl`.
    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Liveness probe used by the health endpoint.
    fn ping(&self) -> Result<(), CacheError>;
}

/// Cache key for a render in `timezone` and `orientation` at `now`.
pub fn cache_key(timezone: &str, orientation: Orientation, now: DateTime<Utc>) -> String {
    format!(
        "{KEY_PREFIX}:{timezone}:{orientation}:{}",
        now.format("%Y%m%d%H%M")
    )
}

/// Build the configured backend, or `None` when caching is off.
pub fn from_config(config: &CacheConfig) -> Option<Arc<dyn ImageCache>> {
    match config.backend {
        CacheBackend::None => {
            info!("image cache disabled");
            None
        }
        CacheBackend::Memory => {
            info!(ttl_secs = config.expire_seconds, "using in-memory image cache");
            Some(Arc::new(MemoryCache::new()))
        }
        CacheBackend::File => {
            info!(dir = %config.dir.display(), ttl_secs = config.expire_seconds, "using file image cache");
            Some(Arc::new(FileCache::new(&config.dir)))
        }
    }
}

/// Cache lookup that logs and swallows backend failures.
pub fn lookup(cache: &dyn ImageCache, key: &str) -> Option<Vec<u8>> {
    match cache.get(key) {
        Ok(Some(bytes)) => {
            debug!(key, "image cache hit");
            Some(bytes)
        }
        Ok(None) => {
            debug!(key, "image cache miss");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "image cache read failed, rendering fresh");
            None
        }
    }
}

/// Cache write that logs and swallows backend failures.
pub fn store(cache: &dyn ImageCache, key: &str, bytes: &[u8], ttl: Duration) {
    if let Err(e) = cache.set(key, bytes, ttl) {
        warn!(key, error = %e, "image cache write failed");
    }
}

struct MemoryEntry {
    expires_at: Instant,
    bytes: Vec<u8>,
}

/// In-process cache with per-entry expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.bytes.clone()))
    }

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                expires_at: now + ttl,
                bytes: bytes.to_vec(),
            },
        );
        Ok(())
    }

    fn ping(&self) -> Result<(), CacheError> {
        self.entries
            .lock()
            .map(|_| ())
            .map_err(|_| CacheError::Poisoned)
    }
}

/// Directory-backed cache.
///
/// Each entry's modification time is set to its expiry instant on write, so
/// expiry needs no side file.
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.png"))
    }
}

impl ImageCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key);
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if SystemTime::now() >= meta.modified()? {
            if let Err(e) = fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "failed to remove expired cache entry");
            }
            return Ok(None);
        }

        Ok(Some(fs::read(&path)?))
    }

    fn set(&self, key: &str, bytes: &[u8], ttl: Duration) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let mut file = File::create(self.entry_path(key))?;
        file.write_all(bytes)?;
        file.set_modified(SystemTime::now() + ttl)?;
        Ok(())
    }

    fn ping(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(".ping"), b"")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::thread;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_key_is_stable_within_a_minute() {
        let a = Utc.with_ymd_and_hms(2025, 4, 4, 14, 25, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 4, 4, 14, 25, 59).unwrap();
        assert_eq!(
            cache_key("UTC", Orientation::Landscape, a),
            cache_key("UTC", Orientation::Landscape, b)
        );
        assert_eq!(
            cache_key("UTC", Orientation::Landscape, a),
            "clock_image:UTC:landscape:202504041425"
        );
    }

    #[test]
    fn test_key_changes_with_minute_and_parameters() {
        let now = Utc.with_ymd_and_hms(2025, 4, 4, 14, 25, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2025, 4, 4, 14, 26, 0).unwrap();
        let base = cache_key("UTC", Orientation::Landscape, now);

        assert_ne!(base, cache_key("UTC", Orientation::Landscape, next));
        assert_ne!(base, cache_key("UTC", Orientation::Portrait, now));
        assert_ne!(base, cache_key("Asia/Tokyo", Orientation::Landscape, now));
    }

    #[test]
    fn test_memory_cache_roundtrip_and_expiry() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").unwrap().is_none());

        cache.set("k", b"png", Duration::from_millis(50)).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some(&b"png"[..]));

        thread::sleep(Duration::from_millis(80));
        assert!(cache.get("k").unwrap().is_none());
        assert!(cache.ping().is_ok());
    }

    #[test]
    fn test_file_cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("store"));
        let key = "clock_image:America/New_York:portrait:202504041425";

        assert!(cache.get(key).unwrap().is_none());
        cache.set(key, b"png", Duration::from_secs(30)).unwrap();
        assert_eq!(cache.get(key).unwrap().as_deref(), Some(&b"png"[..]));
        assert!(cache.ping().is_ok());

        // keys never escape the store directory
        let entry = cache.entry_path(key);
        assert_eq!(entry.parent(), Some(dir.path().join("store").as_path()));
    }

    #[test]
    fn test_file_cache_expiry() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set("k", b"png", Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(cache.get("k").unwrap().is_none());
        assert!(!cache.entry_path("k").exists());
    }

    #[test]
    fn test_ttl_is_per_entry() {
        let memory = MemoryCache::new();
        memory.set("short", b"a", Duration::from_millis(30)).unwrap();
        memory.set("long", b"b", Duration::from_secs(30)).unwrap();

        let dir = TempDir::new().unwrap();
        let files = FileCache::new(dir.path());
        files.set("short", b"a", Duration::ZERO).unwrap();
        files.set("long", b"b", Duration::from_secs(30)).unwrap();

        thread::sleep(Duration::from_millis(60));
        assert!(memory.get("short").unwrap().is_none());
        assert_eq!(memory.get("long").unwrap().as_deref(), Some(&b"b"[..]));
        assert!(files.get("short").unwrap().is_none());
        assert_eq!(files.get("long").unwrap().as_deref(), Some(&b"b"[..]));
    }

    #[test]
    fn test_expired_entries_are_pruned_on_write() {
        let cache = MemoryCache::new();
        cache.set("old", b"a", Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(5));
        cache.set("new", b"b", Duration::from_secs(30)).unwrap();
        assert_eq!(cache.entries.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unwritable_file_cache_degrades_to_miss() {
        // a regular file where the directory should be
        let blocker = NamedTempFile::new().unwrap();
        let cache = FileCache::new(blocker.path().join("sub"));
        let ttl = Duration::from_secs(30);

        assert!(cache.ping().is_err());
        assert!(cache.set("k", b"png", ttl).is_err());
        store(&cache, "k", b"png", ttl);
        assert!(lookup(&cache, "k").is_none());
    }

    #[test]
    fn test_from_config_backends() {
        let mut config = CacheConfig::default();
        config.backend = CacheBackend::None;
        assert!(from_config(&config).is_none());

        config.backend = CacheBackend::Memory;
        assert!(from_config(&config).is_some());
    }
}
