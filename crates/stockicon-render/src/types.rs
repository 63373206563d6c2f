//! Basic size and color types for icon images.
//!
//! Icons are small raster images, so colors are kept as straight (not
//! premultiplied) 8-bit RGBA values. That keeps a color parsed from an icon
//! spec bit-exact when it is written into a pixel buffer and read back.

use std::fmt;

/// A size in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a square size.
    #[inline]
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// A zero size.
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    /// Check if the size has zero area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale both dimensions by an integer factor.
    #[inline]
    pub fn scaled(self, factor: u32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// The larger of the two dimensions.
    #[inline]
    pub fn max_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A straight-alpha RGBA color with 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a color from 8-bit RGBA components.
    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color from 8-bit RGB components.
    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgba8(r, g, b, 255)
    }

    /// Create a color from a 32-bit RGBA value (0xRRGGBBAA).
    #[inline]
    pub const fn from_u32(rgba: u32) -> Self {
        Self::from_rgba8(
            ((rgba >> 24) & 0xFF) as u8,
            ((rgba >> 16) & 0xFF) as u8,
            ((rgba >> 8) & 0xFF) as u8,
            (rgba & 0xFF) as u8,
        )
    }

    /// Pack the color into a 32-bit RGBA value (0xRRGGBBAA).
    #[inline]
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | self.a as u32
    }

    /// Create a color from a hex string (e.g., "#FF0000" or "#FF0000FF").
    ///
    /// The leading `#` is required. Exactly 6 or 8 hex digits are accepted;
    /// anything else returns `None`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let len = digits.len();

        if (len != 6 && len != 8) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
        let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
        let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
        let a = if len == 8 {
            u8::from_str_radix(&digits[6..8], 16).ok()?
        } else {
            255
        };

        Some(Self::from_rgba8(r, g, b, a))
    }

    /// Format as a lower-case `#rrggbbaa` string.
    pub fn to_hex(self) -> String {
        format!("#{:08x}", self.to_u32())
    }

    /// Return a new color with a different alpha.
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Convert to an `[r, g, b, a]` array.
    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const TRANSPARENT: Self = Self::from_rgba8(0, 0, 0, 0);
    pub const BLACK: Self = Self::from_rgb8(0, 0, 0);
    pub const WHITE: Self = Self::from_rgb8(255, 255, 255);
    pub const RED: Self = Self::from_rgb8(255, 0, 0);
    pub const GREEN: Self = Self::from_rgb8(0, 255, 0);
    pub const BLUE: Self = Self::from_rgb8(0, 0, 255);
    pub const MAGENTA: Self = Self::from_rgb8(255, 0, 255);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_hex() {
        let c = Color::from_hex("#FF0000").unwrap();
        assert_eq!(c, Color::RED);

        let c2 = Color::from_hex("#00ff0080").unwrap();
        assert_eq!(c2, Color::from_rgba8(0, 255, 0, 0x80));
    }

    #[test]
    fn test_color_from_hex_rejects_malformed() {
        assert_eq!(Color::from_hex("FF0000"), None);
        assert_eq!(Color::from_hex("#FF00"), None);
        assert_eq!(Color::from_hex("#FF00000"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
        assert_eq!(Color::from_hex("#+F0000"), None);
        assert_eq!(Color::from_hex("#ÿÿÿ"), None);
        assert_eq!(Color::from_hex("#"), None);
    }

    #[test]
    fn test_color_hex_normalizes() {
        let c = Color::from_hex("#ABCDEF").unwrap();
        assert_eq!(c.to_hex(), "#abcdefff");
        assert_eq!(Color::from_u32(c.to_u32()), c);
    }

    #[test]
    fn test_size_helpers() {
        let s = Size::new(16, 24);
        assert_eq!(s.scaled(2), Size::new(32, 48));
        assert_eq!(s.max_side(), 24);
        assert!(!s.is_empty());
        assert!(Size::ZERO.is_empty());
        assert_eq!(s.to_string(), "16x24");
    }
}
