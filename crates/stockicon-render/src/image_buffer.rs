//! Decoded RGBA images.
//!
//! [`ImageBuffer`] wraps `image::DynamicImage` with the operations icons
//! need: decode, solid blocks, resize to a size class, layer one icon over
//! another, and PNG encoding for the disk cache.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use crate::error::{RenderError, RenderResult};
use crate::types::{Color, Size};

/// Resampling filter used when an icon is drawn at a size it was not made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Keeps hard pixel edges. Right for exact 2x steps of pixel art.
    Nearest,
    /// Bilinear.
    #[default]
    Triangle,
    /// Sharper downscaling, slower.
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// An immutable-by-convention RGBA image.
///
/// Every operation returns a new buffer; buffers handed out by a cache are
/// never changed behind the holder's back.
#[derive(Clone)]
pub struct ImageBuffer {
    inner: DynamicImage,
}

impl ImageBuffer {
    /// A fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_color(width, height, Color::TRANSPARENT)
    }

    /// An image filled with `color`.
    pub fn from_color(width: u32, height: u32, color: Color) -> Self {
        let rgba = RgbaImage::from_pixel(width, height, Rgba(color.to_array()));
        Self {
            inner: DynamicImage::ImageRgba8(rgba),
        }
    }

    /// Read and decode an image file.
    pub fn from_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| RenderError::ImageLoad(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Decode an image held in memory, sniffing the format.
    ///
    /// Zero-length input is [`RenderError::EmptyData`], not a decoder error.
    pub fn from_bytes(bytes: &[u8]) -> RenderResult<Self> {
        if bytes.is_empty() {
            return Err(RenderError::EmptyData);
        }
        image::load_from_memory(bytes)
            .map(Self::from_dynamic_image)
            .map_err(|e| RenderError::ImageLoad(e.to_string()))
    }

    pub fn from_dynamic_image(inner: DynamicImage) -> Self {
        Self { inner }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Resize to exactly `width` x `height`. Same-size requests are a clone.
    #[must_use]
    pub fn resize(&self, width: u32, height: u32, filter: ResizeFilter) -> Self {
        if self.dimensions() == (width, height) {
            return self.clone();
        }
        Self::from_dynamic_image(self.inner.resize_exact(width, height, filter.into()))
    }

    #[must_use]
    pub fn resize_to(&self, size: Size, filter: ResizeFilter) -> Self {
        self.resize(size.width, size.height, filter)
    }

    /// The pixel at `(x, y)`, or `None` outside the image.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.inner.in_bounds(x, y).then(|| {
            let [r, g, b, a] = self.inner.get_pixel(x, y).0;
            Color::from_rgba8(r, g, b, a)
        })
    }

    /// Whether every pixel is exactly `color`.
    pub fn is_uniform(&self, color: Color) -> bool {
        let expected = color.to_array();
        self.inner.pixels().all(|(_, _, pixel)| pixel.0 == expected)
    }

    /// Draw `top` over this image with its origin at `(x, y)`.
    ///
    /// Source-over alpha blending; whatever falls outside is clipped.
    #[must_use]
    pub fn overlay(&self, top: &ImageBuffer, x: i64, y: i64) -> Self {
        let mut bottom = self.inner.to_rgba8();
        imageops::overlay(&mut bottom, &top.inner.to_rgba8(), x, y);
        Self::from_dynamic_image(DynamicImage::ImageRgba8(bottom))
    }

    /// Draw `top` centered over this image.
    #[must_use]
    pub fn overlay_centered(&self, top: &ImageBuffer) -> Self {
        let x = (i64::from(self.width()) - i64::from(top.width())) / 2;
        let y = (i64::from(self.height()) - i64::from(top.height())) / 2;
        self.overlay(top, x, y)
    }

    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.inner
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| RenderError::ImageEncode(e.to_string()))?;
        Ok(buffer.into_inner())
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_transparent() {
        let img = ImageBuffer::new(20, 10);
        assert_eq!(img.dimensions(), (20, 10));
        assert!(img.is_uniform(Color::TRANSPARENT));
    }

    #[test]
    fn test_from_color() {
        let img = ImageBuffer::from_color(10, 10, Color::RED);
        assert_eq!(img.size(), Size::square(10));
        assert_eq!(img.get_pixel(9, 9), Some(Color::RED));
        assert_eq!(img.get_pixel(10, 0), None);
    }

    #[test]
    fn test_from_bytes_empty() {
        assert!(matches!(
            ImageBuffer::from_bytes(&[]),
            Err(RenderError::EmptyData)
        ));
    }

    #[test]
    fn test_from_bytes_corrupt() {
        assert!(matches!(
            ImageBuffer::from_bytes(b"not a png"),
            Err(RenderError::ImageLoad(_))
        ));
    }

    #[test]
    fn test_png_keeps_alpha() {
        let color = Color::from_rgba8(10, 20, 30, 40);
        let png = ImageBuffer::from_color(4, 3, color).to_png().unwrap();
        let decoded = ImageBuffer::from_bytes(&png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert!(decoded.is_uniform(color));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageBuffer::from_file(dir.path().join("gone.png")).unwrap_err();
        assert!(matches!(err, RenderError::ImageLoad(_)));
    }

    #[test]
    fn test_resize() {
        let img = ImageBuffer::from_color(48, 48, Color::BLUE);
        let small = img.resize_to(Size::square(16), ResizeFilter::Triangle);
        assert_eq!(small.size(), Size::square(16));
        assert!(small.is_uniform(Color::BLUE));
        assert_eq!(img.resize(48, 48, ResizeFilter::Nearest).dimensions(), (48, 48));
    }

    #[test]
    fn test_overlay_centered() {
        let base = ImageBuffer::from_color(16, 16, Color::RED);
        let badge = ImageBuffer::from_color(8, 8, Color::GREEN);

        let result = base.overlay_centered(&badge);
        assert_eq!(result.get_pixel(0, 0), Some(Color::RED));
        assert_eq!(result.get_pixel(4, 4), Some(Color::GREEN));
        assert_eq!(result.get_pixel(11, 11), Some(Color::GREEN));
        assert_eq!(result.get_pixel(12, 12), Some(Color::RED));
    }

    #[test]
    fn test_larger_overlay_is_clipped() {
        let base = ImageBuffer::from_color(4, 4, Color::RED);
        let big = ImageBuffer::from_color(8, 8, Color::BLUE);
        let result = base.overlay_centered(&big);
        assert_eq!(result.dimensions(), (4, 4));
        assert!(result.is_uniform(Color::BLUE));
    }

    #[test]
    fn test_transparent_overlay_keeps_bottom() {
        let base = ImageBuffer::from_color(4, 4, Color::RED);
        assert!(base.overlay(&ImageBuffer::new(4, 4), 0, 0).is_uniform(Color::RED));
    }

    #[test]
    fn test_half_alpha_blend() {
        let base = ImageBuffer::from_color(1, 1, Color::BLACK);
        let half_white = ImageBuffer::from_color(1, 1, Color::WHITE.with_alpha(128));
        let pixel = base.overlay(&half_white, 0, 0).get_pixel(0, 0).unwrap();
        assert_eq!(pixel.a, 255);
        assert!((i32::from(pixel.r) - 128).abs() <= 1);
    }
}
