//! Composite icons.
//!
//! A composite spec such as `md-file|md-overlay-error` is rendered by
//! layering its parts in order, later parts on top. The first part fixes the
//! pixel size; later parts are scaled to match. A double-density variant is
//! always synthesized from the parts' `@2x` images where present.

use std::collections::HashSet;

use stockicon_core::logging::targets;
use stockicon_render::{ImageBuffer, ResizeFilter, Size};

use crate::cache::ResolvedImage;
use crate::size::IconSize;

/// Layer `parts` bottom to top. Returns `None` if `parts` is empty.
pub fn layer(parts: &[ResolvedImage]) -> Option<ResolvedImage> {
    let (first, rest) = parts.split_first()?;
    let size = first.size();
    let hi_size = size.scaled(2);

    let mut base = first.base().clone();
    let mut hi = hi_dpi_at(first, hi_size);
    for part in rest {
        base = base.overlay_centered(&part.base().resize_to(size, ResizeFilter::Triangle));
        hi = hi.overlay_centered(&hi_dpi_at(part, hi_size));
    }
    Some(ResolvedImage::with_hi_dpi(base, Some(hi)))
}

fn hi_dpi_at(image: &ResolvedImage, size: Size) -> ImageBuffer {
    image
        .hi_dpi()
        .unwrap_or_else(|| image.base())
        .resize_to(size, ResizeFilter::Triangle)
}

/// Remembers which composite ids were built at which size class.
///
/// A size class is attempted once per id; a failed attempt (a missing part)
/// is not retried.
#[derive(Debug, Default)]
pub struct Composer {
    attempted: HashSet<(String, IconSize)>,
}

impl Composer {
    /// Create an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt. Returns `false` if `id` was already attempted at `size`.
    pub fn begin(&mut self, id: &str, size: IconSize) -> bool {
        let fresh = self.attempted.insert((id.to_string(), size));
        if !fresh {
            tracing::trace!(target: targets::COMPOSER, id, %size, "composite already attempted");
        }
        fresh
    }

    /// Whether `id` was attempted at `size`.
    pub fn attempted(&self, id: &str, size: IconSize) -> bool {
        self.attempted.contains(&(id.to_string(), size))
    }

    /// Number of (id, size) attempts recorded.
    pub fn len(&self) -> usize {
        self.attempted.len()
    }

    /// Whether nothing was attempted yet.
    pub fn is_empty(&self) -> bool {
        self.attempted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockicon_render::Color;

    fn solid(px: u32, color: Color) -> ResolvedImage {
        ResolvedImage::new(ImageBuffer::from_color(px, px, color))
    }

    #[test]
    fn test_layer_order() {
        let composed = layer(&[solid(16, Color::RED), solid(16, Color::BLUE)]).unwrap();
        assert!(composed.base().is_uniform(Color::BLUE));

        let composed = layer(&[solid(16, Color::BLUE), solid(16, Color::RED)]).unwrap();
        assert!(composed.base().is_uniform(Color::RED));
    }

    #[test]
    fn test_transparent_overlay_keeps_base() {
        let composed = layer(&[solid(16, Color::GREEN), solid(16, Color::TRANSPARENT)]).unwrap();
        assert!(composed.base().is_uniform(Color::GREEN));
    }

    #[test]
    fn test_first_part_fixes_size() {
        let composed = layer(&[solid(16, Color::RED), solid(48, Color::BLUE)]).unwrap();
        assert_eq!(composed.size(), Size::square(16));
        assert!(composed.base().is_uniform(Color::BLUE));
    }

    #[test]
    fn test_hi_dpi_synthesized() {
        let composed = layer(&[solid(16, Color::RED)]).unwrap();
        let hi = composed.hi_dpi().unwrap();
        assert_eq!(hi.size(), Size::square(32));
        assert!(hi.is_uniform(Color::RED));
    }

    #[test]
    fn test_empty() {
        assert!(layer(&[]).is_none());
    }

    #[test]
    fn test_begin_once() {
        let mut composer = Composer::new();
        assert!(composer.begin("a|b", IconSize::Menu));
        assert!(!composer.begin("a|b", IconSize::Menu));
        assert!(composer.begin("a|b", IconSize::Dialog));
        assert!(composer.attempted("a|b", IconSize::Menu));
        assert_eq!(composer.len(), 2);
    }
}
