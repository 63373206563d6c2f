//! CPU image handling for Stockicon.
//!
//! This crate provides the pixel-level building blocks the icon engine works
//! with:
//!
//! - [`ImageBuffer`]: decoded RGBA images with resize and overlay operations
//! - [`AnimatedImage`] and [`FrameClock`]: frame sequences and looping playback
//! - [`DiskImageCache`]: a bounded on-disk byte cache for downloaded images
//! - [`Color`] and [`Size`]: basic value types

pub mod animated_image;
pub mod disk_cache;
mod error;
pub mod image_buffer;
pub mod types;

pub use animated_image::{
    AnimatedImage, AnimationFrame, DEFAULT_FRAME_DELAY, FrameClock, MIN_FRAME_DELAY,
};
pub use disk_cache::{DiskCacheConfig, DiskCacheStats, DiskImageCache};
pub use error::{RenderError, RenderResult};
pub use image_buffer::{ImageBuffer, ResizeFilter};
pub use types::{Color, Size};
