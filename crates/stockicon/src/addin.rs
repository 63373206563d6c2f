//! Addins: the plugins that contribute icon data.
//!
//! The engine never discovers addins itself. Hosts hand it [`Addin`]
//! implementations through stock icon definitions, and the engine only reads
//! resources and resolves file paths through this trait.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A plugin that owns embedded resources and files.
pub trait Addin: Send + Sync {
    /// Unique addin identifier.
    fn id(&self) -> &str;

    /// Read an embedded resource, or `None` if the addin has no such resource.
    fn resource(&self, name: &str) -> Option<Vec<u8>>;

    /// Resolve a path relative to the addin's install location.
    fn file_path(&self, relative: &str) -> PathBuf;
}

impl fmt::Debug for dyn Addin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addin").field("id", &self.id()).finish()
    }
}

/// An addin backed by an in-memory resource table and a base directory.
///
/// # Example
///
/// ```
/// use stockicon::{Addin, EmbeddedAddin};
///
/// let addin = EmbeddedAddin::new("core")
///     .with_resource("save.png", vec![0u8; 4])
///     .with_base_dir("/usr/share/myapp");
/// assert!(addin.resource("save.png").is_some());
/// assert!(addin.resource("open.png").is_none());
/// ```
#[derive(Clone, Default)]
pub struct EmbeddedAddin {
    id: String,
    resources: HashMap<String, Vec<u8>>,
    base_dir: PathBuf,
}

impl EmbeddedAddin {
    /// Create an addin with no resources, rooted at the current directory.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resources: HashMap::new(),
            base_dir: PathBuf::new(),
        }
    }

    /// Add an embedded resource.
    pub fn with_resource(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(name.into(), bytes.into());
        self
    }

    /// Set the directory file paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Add or replace a resource in place.
    pub fn insert_resource(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.resources.insert(name.into(), bytes.into());
    }

    /// The directory file paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Addin for EmbeddedAddin {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource(&self, name: &str) -> Option<Vec<u8>> {
        self.resources.get(name).cloned()
    }

    fn file_path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }
}

impl fmt::Debug for EmbeddedAddin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedAddin")
            .field("id", &self.id)
            .field("resources", &self.resources.len())
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_path_joins_base_dir() {
        let addin = EmbeddedAddin::new("core").with_base_dir("/opt/app");
        assert_eq!(addin.file_path("icons/a.png"), PathBuf::from("/opt/app/icons/a.png"));
    }

    #[test]
    fn test_absolute_file_path_wins() {
        let addin = EmbeddedAddin::new("core").with_base_dir("/opt/app");
        assert_eq!(addin.file_path("/tmp/a.png"), PathBuf::from("/tmp/a.png"));
    }
}
