//! Error types for the icon engine.
//!
//! None of these reach callers of [`IconService::get_icon`](crate::IconService::get_icon):
//! lookups always degrade to a placeholder. They surface from the lower-level
//! loading functions and are logged where a definition is skipped.

use std::path::PathBuf;

use stockicon_render::RenderError;

/// Errors raised while materializing icons.
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    /// An addin does not provide the named resource.
    #[error("resource '{resource}' not found in addin '{addin}'")]
    ResourceNotFound { addin: String, resource: String },

    /// A file-backed icon could not be read.
    #[error("failed to read icon file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A resource or file was present but held no bytes.
    #[error("icon source '{0}' is empty")]
    EmptySource(String),

    /// Image bytes could not be decoded.
    #[error("failed to decode '{source_name}': {source}")]
    Decode {
        source_name: String,
        #[source]
        source: RenderError,
    },

    /// An animation descriptor line could not be parsed.
    #[error("invalid animation descriptor '{descriptor}' at line {line}: {message}")]
    InvalidDescriptor {
        descriptor: String,
        line: usize,
        message: String,
    },

    /// A composite part or icon reference could not be resolved.
    #[error("icon '{0}' is not registered")]
    UnknownIcon(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IconError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(source_name: impl Into<String>, source: RenderError) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            source,
        }
    }
}

/// Result type for icon operations.
pub type Result<T> = std::result::Result<T, IconError>;
