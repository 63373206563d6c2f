//! Native icon theme fallback.
//!
//! Plain names that no addin registered are looked up in the host's icon
//! theme before the engine gives up and returns the error placeholder.

use std::fmt;
use std::path::{Path, PathBuf};

use stockicon_core::logging::targets;
use stockicon_render::{ImageBuffer, ResizeFilter};

/// The host desktop's icon theme.
pub trait NativeIconTheme: Send + Sync {
    /// Whether the theme provides `name` at any size.
    fn has_icon(&self, name: &str) -> bool;

    /// Load `name` at roughly `pixels` square.
    fn load_icon(&self, name: &str, pixels: u32) -> Option<ImageBuffer>;
}

/// A theme with no icons.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIconTheme;

impl NativeIconTheme for NoIconTheme {
    fn has_icon(&self, _name: &str) -> bool {
        false
    }

    fn load_icon(&self, _name: &str, _pixels: u32) -> Option<ImageBuffer> {
        None
    }
}

/// A theme laid out as `<root>/<N>x<N>/<name>.png` with an optional
/// size-independent `<root>/<name>.png`.
///
/// Several roots may be given; the first root that has the icon wins.
#[derive(Clone, Default)]
pub struct DirectoryIconTheme {
    roots: Vec<PathBuf>,
}

impl DirectoryIconTheme {
    /// Create a theme over the given roots, searched in order.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// The search roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates(root: &Path, name: &str, pixels: u32) -> [PathBuf; 2] {
        let file = format!("{name}.png");
        [
            root.join(format!("{pixels}x{pixels}")).join(&file),
            root.join(file),
        ]
    }

    fn is_safe_name(name: &str) -> bool {
        !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
    }

    fn any_size(root: &Path, name: &str) -> bool {
        if root.join(format!("{name}.png")).is_file() {
            return true;
        }
        let Ok(entries) = std::fs::read_dir(root) else {
            return false;
        };
        entries
            .flatten()
            .any(|entry| entry.path().join(format!("{name}.png")).is_file())
    }
}

impl NativeIconTheme for DirectoryIconTheme {
    fn has_icon(&self, name: &str) -> bool {
        Self::is_safe_name(name) && self.roots.iter().any(|root| Self::any_size(root, name))
    }

    fn load_icon(&self, name: &str, pixels: u32) -> Option<ImageBuffer> {
        if !Self::is_safe_name(name) {
            return None;
        }
        for root in &self.roots {
            for path in Self::candidates(root, name, pixels) {
                if !path.is_file() {
                    continue;
                }
                match ImageBuffer::from_file(&path) {
                    Ok(image) if image.width() == pixels && image.height() == pixels => {
                        return Some(image);
                    }
                    Ok(image) => {
                        return Some(image.resize(pixels, pixels, ResizeFilter::Triangle));
                    }
                    Err(e) => {
                        tracing::warn!(target: targets::LOADER, path = %path.display(), error = %e, "unreadable theme icon");
                    }
                }
            }
        }
        None
    }
}

impl fmt::Debug for DirectoryIconTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryIconTheme")
            .field("roots", &self.roots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockicon_render::Color;

    fn write_png(path: &Path, px: u32, color: Color) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, ImageBuffer::from_color(px, px, color).to_png().unwrap()).unwrap();
    }

    #[test]
    fn test_no_theme() {
        assert!(!NoIconTheme.has_icon("folder"));
        assert!(NoIconTheme.load_icon("folder", 16).is_none());
    }

    #[test]
    fn test_sized_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("16x16/folder.png"), 16, Color::BLUE);
        write_png(&dir.path().join("48x48/folder.png"), 48, Color::GREEN);
        let theme = DirectoryIconTheme::new([dir.path()]);

        assert!(theme.has_icon("folder"));
        assert!(!theme.has_icon("file"));

        let small = theme.load_icon("folder", 16).unwrap();
        assert!(small.is_uniform(Color::BLUE));
        let large = theme.load_icon("folder", 48).unwrap();
        assert!(large.is_uniform(Color::GREEN));
    }

    #[test]
    fn test_unsized_fallback_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("folder.png"), 64, Color::RED);
        let theme = DirectoryIconTheme::new([dir.path()]);

        let image = theme.load_icon("folder", 24).unwrap();
        assert_eq!(image.dimensions(), (24, 24));
    }

    #[test]
    fn test_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("16x16/folder.png"), 16, Color::BLUE);
        let theme = DirectoryIconTheme::new([dir.path()]);
        assert!(!theme.has_icon("16x16/folder"));
        assert!(theme.load_icon("../folder", 16).is_none());
    }
}
