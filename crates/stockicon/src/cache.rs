//! Resolved images and the icon cache.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use stockicon_core::logging::targets;
use stockicon_render::{ImageBuffer, ResizeFilter, Size};

use crate::size::IconSize;

/// An immutable image with an optional double-density companion.
///
/// Cloning is cheap: pixel data is shared.
#[derive(Clone)]
pub struct ResolvedImage {
    base: Arc<ImageBuffer>,
    hi_dpi: Option<Arc<ImageBuffer>>,
}

impl ResolvedImage {
    /// Wrap a single-resolution image.
    pub fn new(base: ImageBuffer) -> Self {
        Self {
            base: Arc::new(base),
            hi_dpi: None,
        }
    }

    /// Wrap an image with an optional `@2x` companion.
    pub fn with_hi_dpi(base: ImageBuffer, hi_dpi: Option<ImageBuffer>) -> Self {
        Self {
            base: Arc::new(base),
            hi_dpi: hi_dpi.map(Arc::new),
        }
    }

    /// The 1x image.
    pub fn base(&self) -> &ImageBuffer {
        &self.base
    }

    /// The 2x companion, if one was loaded or synthesized.
    pub fn hi_dpi(&self) -> Option<&ImageBuffer> {
        self.hi_dpi.as_deref()
    }

    /// Whether a 2x companion is present.
    pub fn has_hi_dpi(&self) -> bool {
        self.hi_dpi.is_some()
    }

    /// Logical size (the size of the 1x image).
    pub fn size(&self) -> Size {
        self.base.size()
    }

    /// Pick the best representation for a display scale factor.
    pub fn for_scale(&self, scale: f32) -> &ImageBuffer {
        match &self.hi_dpi {
            Some(hi) if scale > 1.0 => hi,
            _ => &self.base,
        }
    }

    /// Scale both representations to a new logical size.
    ///
    /// Returns a clone sharing pixel data when the size already matches.
    pub fn resized(&self, size: Size) -> ResolvedImage {
        if self.size() == size {
            return self.clone();
        }
        let base = self.base.resize_to(size, ResizeFilter::Triangle);
        let hi_dpi = self
            .hi_dpi
            .as_ref()
            .map(|hi| hi.resize_to(size.scaled(2), ResizeFilter::Triangle));
        ResolvedImage::with_hi_dpi(base, hi_dpi)
    }

    /// Whether both values share the same pixel data.
    pub fn ptr_eq(&self, other: &ResolvedImage) -> bool {
        Arc::ptr_eq(&self.base, &other.base)
    }
}

impl fmt::Debug for ResolvedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedImage")
            .field("size", &self.size())
            .field("hi_dpi", &self.has_hi_dpi())
            .finish()
    }
}

struct IconInner {
    id: String,
    variants: BTreeMap<IconSize, ResolvedImage>,
    default: ResolvedImage,
    sized: Mutex<HashMap<IconSize, ResolvedImage>>,
}

/// A cached icon: one image per registered size class.
///
/// `Icon` is an immutable snapshot. Registering a new variant in the cache
/// produces a new snapshot, so two `Icon` values compare [`ptr_eq`](Self::ptr_eq)
/// only if nothing was registered under the id in between.
#[derive(Clone)]
pub struct Icon {
    inner: Arc<IconInner>,
}

impl Icon {
    /// Create an icon with a single variant.
    pub fn new(id: impl Into<String>, size: IconSize, image: ResolvedImage) -> Self {
        let mut variants = BTreeMap::new();
        variants.insert(size, image.clone());
        Self::from_parts(id.into(), variants, image)
    }

    fn from_parts(
        id: String,
        variants: BTreeMap<IconSize, ResolvedImage>,
        default: ResolvedImage,
    ) -> Self {
        Self {
            inner: Arc::new(IconInner {
                id,
                variants,
                default,
                sized: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// A new snapshot with `size` set to `image`, replacing any previous variant.
    #[must_use]
    pub fn with_variant(&self, size: IconSize, image: ResolvedImage) -> Self {
        let mut variants = self.inner.variants.clone();
        variants.insert(size, image.clone());

        // The wildcard is the default; without one the largest variant is,
        // and an earlier variant keeps the slot on ties.
        let default = if size.is_wildcard() {
            image
        } else if let Some(wildcard) = variants.get(&IconSize::Wildcard) {
            wildcard.clone()
        } else {
            let current = &self.inner.default;
            let replaced_default = self
                .inner
                .variants
                .get(&size)
                .is_some_and(|old| old.ptr_eq(current));
            if replaced_default {
                variants
                    .values()
                    .fold(&image, |best, v| {
                        if v.size().max_side() > best.size().max_side() {
                            v
                        } else {
                            best
                        }
                    })
                    .clone()
            } else if image.size().max_side() > current.size().max_side() {
                image
            } else {
                current.clone()
            }
        };
        Self::from_parts(self.inner.id.clone(), variants, default)
    }

    /// The cache key this icon is registered under.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The variant registered for exactly `size`.
    pub fn variant(&self, size: IconSize) -> Option<&ResolvedImage> {
        self.inner.variants.get(&size)
    }

    /// Registered size classes, wildcard first.
    pub fn sizes(&self) -> impl Iterator<Item = IconSize> + '_ {
        self.inner.variants.keys().copied()
    }

    /// Number of registered variants.
    pub fn variant_count(&self) -> usize {
        self.inner.variants.len()
    }

    /// The size-independent variant, if registered.
    pub fn wildcard(&self) -> Option<&ResolvedImage> {
        self.variant(IconSize::Wildcard)
    }

    /// The wildcard variant, or the largest concrete one.
    pub fn default_image(&self) -> &ResolvedImage {
        &self.inner.default
    }

    /// The image to draw at `size`.
    ///
    /// An exact variant wins. Otherwise the default variant is scaled to the
    /// nominal pixel size, and the scaled copy is memoized.
    pub fn with_size(&self, size: IconSize) -> ResolvedImage {
        if let Some(exact) = self.variant(size) {
            return exact.clone();
        }
        let Some(target) = size.dimensions() else {
            return self.default_image().clone();
        };

        let mut sized = self.inner.sized.lock();
        if let Some(hit) = sized.get(&size) {
            return hit.clone();
        }
        let scaled = self.default_image().resized(target);
        sized.insert(size, scaled.clone());
        scaled
    }

    /// Whether both values are the same snapshot.
    pub fn ptr_eq(&self, other: &Icon) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icon")
            .field("id", &self.inner.id)
            .field("sizes", &self.inner.variants.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Finished icons keyed by canonical id.
#[derive(Default)]
pub struct IconCache {
    icons: HashMap<String, Icon>,
}

impl IconCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an icon by canonical id.
    pub fn get(&self, id: &str) -> Option<Icon> {
        self.icons.get(id).cloned()
    }

    /// Whether an icon is cached under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.icons.contains_key(id)
    }

    /// Register one size variant under `id`, replacing a previous variant of
    /// the same size.
    pub fn register(&mut self, id: &str, size: IconSize, image: ResolvedImage) -> Icon {
        let icon = match self.icons.get(id) {
            Some(existing) => existing.with_variant(size, image),
            None => Icon::new(id, size, image),
        };
        tracing::trace!(target: targets::CACHE, id, %size, variants = icon.variant_count(), "registered icon variant");
        self.icons.insert(id.to_string(), icon.clone());
        icon
    }

    /// Insert a finished icon under its own id, replacing any previous entry.
    pub fn insert(&mut self, icon: Icon) {
        self.icons.insert(icon.id().to_string(), icon);
    }

    /// Remove an icon.
    pub fn remove(&mut self, id: &str) -> Option<Icon> {
        self.icons.remove(id)
    }

    /// Number of cached icons.
    pub fn len(&self) -> usize {
        self.icons.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Cached ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.icons.keys().map(String::as_str)
    }
}

impl fmt::Debug for IconCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconCache").field("len", &self.icons.len()).finish()
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
    fn test_register_replaces_variant() {
        let mut cache = IconCache::new();
        cache.register("a", IconSize::Menu, solid(16, Color::RED));
        cache.register("a", IconSize::Menu, solid(16, Color::BLUE));
        let icon = cache.get("a").unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(icon.variant_count(), 1);
        assert!(icon.variant(IconSize::Menu).unwrap().base().is_uniform(Color::BLUE));
    }

    #[test]
    fn test_snapshot_identity() {
        let mut cache = IconCache::new();
        cache.register("a", IconSize::Menu, solid(16, Color::RED));
        let first = cache.get("a").unwrap();
        assert!(first.ptr_eq(&cache.get("a").unwrap()));

        cache.register("a", IconSize::Dialog, solid(48, Color::RED));
        assert!(!first.ptr_eq(&cache.get("a").unwrap()));
    }

    #[test]
    fn test_with_size_prefers_exact() {
        let icon = Icon::new("a", IconSize::Menu, solid(16, Color::RED))
            .with_variant(IconSize::Wildcard, solid(48, Color::BLUE));
        let menu = icon.with_size(IconSize::Menu);
        assert!(menu.base().is_uniform(Color::RED));
    }

    #[test]
    fn test_with_size_scales_wildcard() {
        let icon = Icon::new("a", IconSize::Wildcard, solid(48, Color::BLUE));
        let dnd = icon.with_size(IconSize::Dnd);
        assert_eq!(dnd.size(), Size::square(32));
        // Memoized.
        assert!(dnd.ptr_eq(&icon.with_size(IconSize::Dnd)));
    }

    #[test]
    fn test_default_image_falls_back_to_largest() {
        let icon = Icon::new("a", IconSize::Menu, solid(16, Color::RED))
            .with_variant(IconSize::Dnd, solid(32, Color::GREEN));
        assert_eq!(icon.default_image().size(), Size::square(32));
        assert_eq!(icon.with_size(IconSize::Wildcard).size(), Size::square(32));
    }

    #[test]
    fn test_resized_scales_hi_dpi() {
        let image = ResolvedImage::with_hi_dpi(
            ImageBuffer::from_color(16, 16, Color::RED),
            Some(ImageBuffer::from_color(32, 32, Color::RED)),
        );
        let resized = image.resized(Size::square(24));
        assert_eq!(resized.size(), Size::square(24));
        assert_eq!(resized.hi_dpi().unwrap().size(), Size::square(48));
        assert_eq!(resized.for_scale(2.0).width(), 48);
        assert_eq!(resized.for_scale(1.0).width(), 24);
    }
}
