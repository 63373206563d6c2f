//! Disk-based cache for downloaded image bytes.
//!
//! Entries are keyed by a caller-chosen string (for remote avatars this is the
//! `hash@WxH[xS]` cache key) and stored as one file per key. Keys made only of
//! filename-safe characters are used as the file name directly, so the cache
//! directory stays human-readable; any other key is hashed.
//!
//! # Example
//!
//! ```ignore
//! use stockicon_render::{DiskImageCache, DiskCacheConfig};
//!
//! let config = DiskCacheConfig::default()
//!     .with_cache_dir(temp_dir.join("Avatars"))
//!     .with_max_size_mb(20);
//!
//! let mut cache = DiskImageCache::new(config)?;
//!
//! if let Some(bytes) = cache.get("0123abcd@32x32")? {
//!     // Use cached bytes
//! } else {
//!     let bytes = download();
//!     cache.insert("0123abcd@32x32", &bytes)?;
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{RenderError, RenderResult};

/// Configuration for the disk image cache.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Root directory for the cache.
    /// Default: system temp directory / "stockicon-image-cache".
    pub cache_dir: PathBuf,
    /// Maximum cache size in bytes.
    /// Default: 50 MB.
    pub max_size_bytes: u64,
    /// Time-to-live for cache entries.
    /// Default: 7 days. Set to None for no expiration.
    pub ttl: Option<Duration>,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: std::env::temp_dir().join("stockicon-image-cache"),
            max_size_bytes: 50 * 1024 * 1024,
            ttl: Some(Duration::from_secs(7 * 24 * 60 * 60)),
        }
    }
}

impl DiskCacheConfig {
    /// Set the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = path.into();
        self
    }

    /// Set the maximum cache size in megabytes.
    #[must_use]
    pub fn with_max_size_mb(mut self, mb: u64) -> Self {
        self.max_size_bytes = mb * 1024 * 1024;
        self
    }

    /// Set the maximum cache size in bytes.
    #[must_use]
    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Set the time-to-live for cache entries.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable time-to-live (entries never expire).
    #[must_use]
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }
}

/// Metadata for a cache entry.
#[derive(Debug, Clone)]
struct CacheEntryMeta {
    size: u64,
    created: SystemTime,
    last_accessed: SystemTime,
}

/// A size-bounded disk cache for image bytes.
///
/// When the cache exceeds its size limit, the least recently accessed entries
/// are evicted. Entries older than the configured TTL are treated as misses.
///
/// # Thread Safety
///
/// This cache is not internally synchronized. Share it behind a `Mutex`.
pub struct DiskImageCache {
    config: DiskCacheConfig,
    /// File name -> metadata.
    entries: HashMap<String, CacheEntryMeta>,
    current_size: u64,
}

impl DiskImageCache {
    /// Create a new disk cache with the given configuration.
    ///
    /// Creates the cache directory if it doesn't exist and picks up any
    /// entries left there by a previous run.
    pub fn new(config: DiskCacheConfig) -> RenderResult<Self> {
        fs::create_dir_all(&config.cache_dir)
            .map_err(|e| RenderError::cache_io(&config.cache_dir, e))?;

        let mut cache = Self {
            config,
            entries: HashMap::new(),
            current_size: 0,
        };
        cache.scan_cache_dir()?;

        tracing::debug!(
            target: "stockicon_render::disk_cache",
            dir = ?cache.config.cache_dir,
            entries = cache.entries.len(),
            "disk cache opened"
        );
        Ok(cache)
    }

    fn scan_cache_dir(&mut self) -> RenderResult<()> {
        let entries = fs::read_dir(&self.config.cache_dir)
            .map_err(|e| RenderError::cache_io(&self.config.cache_dir, e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let (Some(file_name), Ok(metadata)) =
                (path.file_name().and_then(|n| n.to_str()), entry.metadata())
            else {
                continue;
            };

            let size = metadata.len();
            let created = metadata
                .modified()
                .or_else(|_| metadata.created())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let last_accessed = metadata.accessed().unwrap_or(created);

            self.entries.insert(
                file_name.to_string(),
                CacheEntryMeta {
                    size,
                    created,
                    last_accessed,
                },
            );
            self.current_size += size;
        }

        Ok(())
    }

    /// Map a key to the file name used on disk.
    ///
    /// Keys of ASCII alphanumerics plus `@`, `.`, `-` and `_` are used as-is.
    pub fn file_name_for(key: &str) -> String {
        let safe = !key.is_empty()
            && !key.starts_with('.')
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'@' | b'.' | b'-' | b'_'));
        if safe {
            return key.to_string();
        }

        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Get the on-disk path for a key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.config.cache_dir.join(Self::file_name_for(key))
    }

    /// Get the current cache size in bytes.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.current_size
    }

    /// Get the number of entries in the cache.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the cache directory path.
    #[inline]
    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    fn is_expired(&self, meta: &CacheEntryMeta) -> bool {
        match (self.config.ttl, meta.created.elapsed()) {
            (Some(ttl), Ok(age)) => age > ttl,
            _ => false,
        }
    }

    /// Check if a live (non-expired) entry exists for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(&Self::file_name_for(key))
            .is_some_and(|meta| !self.is_expired(meta))
    }

    /// Get cached data for a key.
    ///
    /// Returns `None` if the key is not cached or the entry has expired.
    pub fn get(&mut self, key: &str) -> RenderResult<Option<Vec<u8>>> {
        let file_name = Self::file_name_for(key);
        let Some(meta) = self.entries.get(&file_name) else {
            return Ok(None);
        };

        if self.is_expired(meta) {
            self.remove(key)?;
            return Ok(None);
        }

        let path = self.config.cache_dir.join(&file_name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted behind our back.
                if let Some(meta) = self.entries.remove(&file_name) {
                    self.current_size -= meta.size;
                }
                return Ok(None);
            }
            Err(e) => return Err(RenderError::cache_io(path, e)),
        };

        if let Some(entry) = self.entries.get_mut(&file_name) {
            entry.last_accessed = SystemTime::now();
        }

        Ok(Some(data))
    }

    /// Insert data into the cache for a key.
    ///
    /// If the cache exceeds its size limit, least recently used entries are
    /// evicted. An entry larger than the whole cache is silently skipped.
    pub fn insert(&mut self, key: &str, data: &[u8]) -> RenderResult<()> {
        let file_name = Self::file_name_for(key);
        let size = data.len() as u64;

        if self.entries.contains_key(&file_name) {
            self.remove(key)?;
        }

        if size > self.config.max_size_bytes {
            return Ok(());
        }

        while self.current_size + size > self.config.max_size_bytes && !self.entries.is_empty() {
            self.evict_oldest();
        }

        let path = self.config.cache_dir.join(&file_name);
        fs::write(&path, data).map_err(|e| RenderError::cache_io(&path, e))?;

        let now = SystemTime::now();
        self.entries.insert(
            file_name,
            CacheEntryMeta {
                size,
                created: now,
                last_accessed: now,
            },
        );
        self.current_size += size;

        Ok(())
    }

    /// Remove a cached entry.
    pub fn remove(&mut self, key: &str) -> RenderResult<bool> {
        let file_name = Self::file_name_for(key);

        let Some(meta) = self.entries.remove(&file_name) else {
            return Ok(false);
        };
        self.current_size -= meta.size;

        let path = self.config.cache_dir.join(&file_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(RenderError::cache_io(path, e)),
        }
    }

    /// Evict the least recently accessed entry.
    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, meta)| meta.last_accessed)
            .map(|(name, _)| name.clone());

        if let Some(name) = oldest
            && let Some(meta) = self.entries.remove(&name)
        {
            self.current_size -= meta.size;
            tracing::trace!(target: "stockicon_render::disk_cache", entry = %name, "evicted");
            let _ = fs::remove_file(self.config.cache_dir.join(&name));
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        for name in self.entries.keys() {
            let _ = fs::remove_file(self.config.cache_dir.join(name));
        }
        self.entries.clear();
        self.current_size = 0;
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn prune_expired(&mut self) -> usize {
        if self.config.ttl.is_none() {
            return 0;
        }

        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, meta)| self.is_expired(meta))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &expired {
            if let Some(meta) = self.entries.remove(name) {
                self.current_size -= meta.size;
                let _ = fs::remove_file(self.config.cache_dir.join(name));
            }
        }

        expired.len()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> DiskCacheStats {
        DiskCacheStats {
            entries: self.entries.len(),
            size_bytes: self.current_size,
            max_size_bytes: self.config.max_size_bytes,
            cache_dir: self.config.cache_dir.clone(),
        }
    }
}

impl std::fmt::Debug for DiskImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskImageCache")
            .field("entries", &self.entries.len())
            .field("size_bytes", &self.current_size)
            .field("max_size_bytes", &self.config.max_size_bytes)
            .field("cache_dir", &self.config.cache_dir)
            .finish()
    }
}

/// Statistics about the disk cache.
#[derive(Debug, Clone)]
pub struct DiskCacheStats {
    /// Number of entries in the cache.
    pub entries: usize,
    /// Current size in bytes.
    pub size_bytes: u64,
    /// Maximum size in bytes.
    pub max_size_bytes: u64,
    /// Cache directory path.
    pub cache_dir: PathBuf,
}

impl DiskCacheStats {
    /// Get the usage percentage (0.0 to 100.0).
    pub fn usage_percent(&self) -> f64 {
        if self.max_size_bytes == 0 {
            0.0
        } else {
            (self.size_bytes as f64 / self.max_size_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cache_in(dir: &tempfile::TempDir) -> DiskImageCache {
        DiskImageCache::new(DiskCacheConfig::default().with_cache_dir(dir.path())).unwrap()
    }

    #[test]
    fn test_disk_cache_insert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        let key = "0123abcd@32x32";
        cache.insert(key, b"test image data").unwrap();
        assert!(cache.contains(key));
        assert!(dir.path().join(key).is_file());

        let retrieved = cache.get(key).unwrap();
        assert_eq!(retrieved.as_deref(), Some(&b"test image data"[..]));
    }

    #[test]
    fn test_disk_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);
        assert!(cache.get("missing@16x16").unwrap().is_none());
    }

    #[test]
    fn test_unsafe_keys_are_hashed() {
        assert_eq!(DiskImageCache::file_name_for("abc@16x16x2"), "abc@16x16x2");
        let hashed = DiskImageCache::file_name_for("../escape");
        assert_eq!(hashed.len(), 16);
        assert!(!hashed.contains('/'));
        assert_ne!(DiskImageCache::file_name_for(".hidden"), ".hidden");
    }

    #[test]
    fn test_disk_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = cache_in(&dir);
            cache.insert("persisted@8x8", b"bytes").unwrap();
        }
        let mut reopened = cache_in(&dir);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("persisted@8x8").unwrap().as_deref(), Some(&b"bytes"[..]));
    }

    #[test]
    fn test_disk_cache_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        cache.insert("k", b"data").unwrap();
        assert!(cache.remove("k").unwrap());
        assert!(!cache.contains("k"));
        assert!(!cache.remove("k").unwrap());
    }

    #[test]
    fn test_disk_cache_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(&dir);

        cache.insert("a", b"a").unwrap();
        cache.insert("b", b"b").unwrap();
        cache.insert("c", b"c").unwrap();
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_disk_cache_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DiskImageCache::new(
            DiskCacheConfig::default()
                .with_cache_dir(dir.path())
                .with_max_size_bytes(100),
        )
        .unwrap();

        cache.insert("a", &[0u8; 50]).unwrap();
        thread::sleep(Duration::from_millis(5));
        cache.insert("b", &[0u8; 50]).unwrap();
        thread::sleep(Duration::from_millis(5));
        cache.insert("c", &[0u8; 50]).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.size_bytes() <= 100);
        assert!(!cache.contains("a"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_disk_cache_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DiskImageCache::new(
            DiskCacheConfig::default()
                .with_cache_dir(dir.path())
                .with_ttl(Duration::from_millis(50)),
        )
        .unwrap();

        cache.insert("k", b"data").unwrap();
        assert!(cache.contains("k"));

        thread::sleep(Duration::from_millis(100));

        assert!(!cache.contains("k"));
        assert!(cache.get("k").unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_prune_expired() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DiskImageCache::new(
            DiskCacheConfig::default()
                .with_cache_dir(dir.path())
                .with_ttl(Duration::from_millis(30)),
        )
        .unwrap();

        cache.insert("a", b"1").unwrap();
        cache.insert("b", b"2").unwrap();
        thread::sleep(Duration::from_millis(60));

        assert_eq!(cache.prune_expired(), 2);
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_disk_cache_stats() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DiskImageCache::new(
            DiskCacheConfig::default()
                .with_cache_dir(dir.path())
                .with_max_size_mb(10),
        )
        .unwrap();

        cache.insert("k", b"test data").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.size_bytes, 9);
        assert_eq!(stats.cache_dir, dir.path());
        assert!(stats.usage_percent() > 0.0);
    }

    #[test]
    fn test_oversized_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DiskImageCache::new(
            DiskCacheConfig::default()
                .with_cache_dir(dir.path())
                .with_max_size_bytes(10),
        )
        .unwrap();

        cache.insert("big", &[0u8; 100]).unwrap();
        assert_eq!(cache.len(), 0);
    }
}
