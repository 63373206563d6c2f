//! Engine configuration.
//!
//! Everything has a default, so hosts only spell out what they change:
//!
//! ```toml
//! color_block_size = "menu"
//! warning_color = "#ff0000"
//!
//! [remote]
//! base_url = "https://www.gravatar.com/avatar"
//! max_disk_cache_mb = 20
//! max_memory_entries = 256
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Deserializer};
use stockicon_render::{Color, DiskCacheConfig};

use crate::error::{IconError, Result};
use crate::registry::STOCK_ICONS_EXTENSION_PATH;
use crate::size::IconSize;

/// Default remote avatar endpoint.
pub const DEFAULT_AVATAR_BASE_URL: &str = "https://www.gravatar.com/avatar";

fn deserialize_color<'de, D>(deserializer: D) -> std::result::Result<Color, D::Error>
where
    D: Deserializer<'de>,
{
    let hex = String::deserialize(deserializer)?;
    Color::from_hex(&hex)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid color '{hex}'")))
}

/// Configuration for [`IconService`](crate::IconService).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IconServiceConfig {
    /// Extension point stock icons are read from.
    pub extension_path: String,
    /// Size of color blocks synthesized for `#RRGGBB` specs.
    ///
    /// Defaults to the menu size for every request, which is what existing
    /// callers expect. [`IconSize::Wildcard`] makes blocks follow the
    /// requested size instead.
    pub color_block_size: IconSize,
    /// Color of the placeholder returned for empty names.
    #[serde(deserialize_with = "deserialize_color")]
    pub warning_color: Color,
    /// Color of the placeholder returned for unknown names.
    #[serde(deserialize_with = "deserialize_color")]
    pub error_color: Color,
    /// Pre-load every icon contributed by the host's own addin on initialize.
    pub prewarm_own_addin: bool,
    /// Remote image settings.
    pub remote: RemoteImageConfig,
}

impl Default for IconServiceConfig {
    fn default() -> Self {
        Self {
            extension_path: STOCK_ICONS_EXTENSION_PATH.to_string(),
            color_block_size: IconSize::Menu,
            warning_color: Color::RED,
            error_color: Color::MAGENTA,
            prewarm_own_addin: true,
            remote: RemoteImageConfig::default(),
        }
    }
}

impl IconServiceConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| IconError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| IconError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Set the color block size.
    pub fn with_color_block_size(mut self, size: IconSize) -> Self {
        self.color_block_size = size;
        self
    }

    /// Set the placeholder colors.
    pub fn with_placeholder_colors(mut self, warning: Color, error: Color) -> Self {
        self.warning_color = warning;
        self.error_color = error;
        self
    }

    /// Enable or disable pre-warming.
    pub fn with_prewarm(mut self, enabled: bool) -> Self {
        self.prewarm_own_addin = enabled;
        self
    }

    /// Set the extension point path.
    pub fn with_extension_path(mut self, path: impl Into<String>) -> Self {
        self.extension_path = path.into();
        self
    }

    /// Replace the remote image settings.
    pub fn with_remote(mut self, remote: RemoteImageConfig) -> Self {
        self.remote = remote;
        self
    }
}

/// Configuration for the remote image loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteImageConfig {
    /// Endpoint the identity hash is appended to.
    pub base_url: String,
    /// Directory downloaded images are cached in.
    pub cache_dir: PathBuf,
    /// Disk cache budget in megabytes.
    pub max_disk_cache_mb: u64,
    /// Disk cache entry lifetime in seconds; `0` keeps entries until evicted.
    pub disk_ttl_secs: u64,
    /// Number of loaders kept in memory.
    pub max_memory_entries: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RemoteImageConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AVATAR_BASE_URL.to_string(),
            cache_dir: default_remote_cache_dir(),
            max_disk_cache_mb: 20,
            disk_ttl_secs: 7 * 24 * 60 * 60,
            max_memory_entries: 256,
            request_timeout_secs: 30,
        }
    }
}

/// `<user cache dir>/stockicon/Gravatars`, or the temp dir if the platform
/// has no cache directory.
pub fn default_remote_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "stockicon")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("stockicon"))
        .join("Gravatars")
}

impl RemoteImageConfig {
    /// Set the endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the disk cache budget.
    pub fn with_max_disk_cache_mb(mut self, mb: u64) -> Self {
        self.max_disk_cache_mb = mb;
        self
    }

    /// Set the in-memory loader budget.
    pub fn with_max_memory_entries(mut self, entries: usize) -> Self {
        self.max_memory_entries = entries;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The disk cache settings derived from this configuration.
    pub fn disk_cache_config(&self) -> DiskCacheConfig {
        let config = DiskCacheConfig::default()
            .with_cache_dir(self.cache_dir.clone())
            .with_max_size_mb(self.max_disk_cache_mb);
        if self.disk_ttl_secs == 0 {
            config.without_ttl()
        } else {
            config.with_ttl(Duration::from_secs(self.disk_ttl_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IconServiceConfig::default();
        assert_eq!(config.extension_path, STOCK_ICONS_EXTENSION_PATH);
        assert_eq!(config.color_block_size, IconSize::Menu);
        assert_ne!(config.warning_color, config.error_color);
        assert!(config.prewarm_own_addin);
        assert_eq!(config.remote.base_url, DEFAULT_AVATAR_BASE_URL);
        assert!(config.remote.cache_dir.ends_with("Gravatars"));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = IconServiceConfig::from_toml(
            r##"
            color_block_size = "wildcard"
            error_color = "#00ff00"

            [remote]
            base_url = "http://localhost:9000/avatar"
            max_memory_entries = 4
            disk_ttl_secs = 0
            "##,
        )
        .unwrap();

        assert_eq!(config.color_block_size, IconSize::Wildcard);
        assert_eq!(config.error_color, Color::GREEN);
        assert_eq!(config.warning_color, Color::RED);
        assert_eq!(config.remote.base_url, "http://localhost:9000/avatar");
        assert_eq!(config.remote.max_memory_entries, 4);
        assert_eq!(config.remote.max_disk_cache_mb, 20);
        assert_eq!(config.remote.disk_cache_config().ttl, None);
    }

    #[test]
    fn test_from_toml_rejects_bad_color() {
        let err = IconServiceConfig::from_toml(r##"warning_color = "red""##).unwrap_err();
        assert!(matches!(err, IconError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icons.toml");
        std::fs::write(&path, "prewarm_own_addin = false\n").unwrap();
        let config = IconServiceConfig::from_file(&path).unwrap();
        assert!(!config.prewarm_own_addin);
    }

    #[test]
    fn test_builders() {
        let remote = RemoteImageConfig::default()
            .with_cache_dir("/tmp/avatars")
            .with_max_disk_cache_mb(5)
            .with_request_timeout(Duration::from_secs(3));
        let config = IconServiceConfig::default()
            .with_color_block_size(IconSize::Dialog)
            .with_remote(remote);
        assert_eq!(config.color_block_size, IconSize::Dialog);
        assert_eq!(config.remote.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.remote.disk_cache_config().max_size_bytes, 5 * 1024 * 1024);
    }
}
