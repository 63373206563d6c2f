//! Error types for the render crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while decoding, encoding or caching images.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Image bytes could not be decoded.
    #[error("failed to load image: {0}")]
    ImageLoad(String),

    /// An image could not be encoded.
    #[error("failed to encode image: {0}")]
    ImageEncode(String),

    /// The input contained no bytes at all.
    #[error("image data is empty")]
    EmptyData,

    /// An animation could not be decoded or contained no frames.
    #[error("failed to decode animation: {0}")]
    Animation(String),

    /// Filesystem error in the disk cache.
    #[error("cache I/O error at {path:?}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
