//! Frame sequences and looping playback.
//!
//! An [`AnimatedImage`] is an ordered list of full-canvas frames, each with
//! its own delay, decoded from a GIF or assembled from separately loaded
//! images. A [`FrameClock`] walks the frames as the host's timer reports
//! elapsed time, wrapping back to the first frame forever.

use std::io::Cursor;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};

use crate::error::{RenderError, RenderResult};
use crate::image_buffer::ImageBuffer;

/// Shortest delay a frame may have.
///
/// GIF encoders commonly write 0 for "as fast as possible"; frames that
/// short would make [`FrameClock::advance`] spin.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

/// Delay of frames that do not specify one.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// One frame and how long it stays on screen.
#[derive(Clone)]
pub struct AnimationFrame {
    image: ImageBuffer,
    delay: Duration,
}

impl AnimationFrame {
    /// Create a frame. Delays below [`MIN_FRAME_DELAY`] are raised to it.
    pub fn new(image: ImageBuffer, delay: Duration) -> Self {
        Self {
            image,
            delay: delay.max(MIN_FRAME_DELAY),
        }
    }

    #[inline]
    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl std::fmt::Debug for AnimationFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationFrame")
            .field("size", &self.image.size().to_string())
            .field("delay", &self.delay)
            .finish()
    }
}

/// A non-empty, looping sequence of frames.
#[derive(Clone)]
pub struct AnimatedImage {
    frames: Vec<AnimationFrame>,
}

impl AnimatedImage {
    /// Whether `data` starts with a GIF signature.
    pub fn is_gif(data: &[u8]) -> bool {
        data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")
    }

    /// Decode every frame of an animated GIF onto the full canvas.
    pub fn from_gif(data: &[u8]) -> RenderResult<Self> {
        if data.is_empty() {
            return Err(RenderError::EmptyData);
        }
        let decoder = GifDecoder::new(Cursor::new(data))
            .map_err(|e| RenderError::Animation(e.to_string()))?;

        let frames = decoder
            .into_frames()
            .map(|frame| {
                let frame = frame.map_err(|e| RenderError::Animation(e.to_string()))?;
                let (numer, denom) = frame.delay().numer_denom_ms();
                let delay = match numer.checked_div(denom) {
                    Some(ms) if ms > 0 => Duration::from_millis(u64::from(ms)),
                    _ => DEFAULT_FRAME_DELAY,
                };
                let image =
                    ImageBuffer::from_dynamic_image(DynamicImage::ImageRgba8(frame.into_buffer()));
                Ok(AnimationFrame::new(image, delay))
            })
            .collect::<RenderResult<Vec<_>>>()?;
        Self::from_frames(frames)
    }

    /// Assemble an animation from loaded frames. Fails if `frames` is empty.
    pub fn from_frames(frames: Vec<AnimationFrame>) -> RenderResult<Self> {
        if frames.is_empty() {
            return Err(RenderError::Animation("no frames".to_string()));
        }
        Ok(Self { frames })
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn frame(&self, index: usize) -> Option<&AnimationFrame> {
        self.frames.get(index)
    }

    #[inline]
    pub fn first_frame(&self) -> &AnimationFrame {
        &self.frames[0]
    }

    #[inline]
    pub fn frames(&self) -> &[AnimationFrame] {
        &self.frames
    }

    /// Length of one pass through all frames.
    pub fn cycle_duration(&self) -> Duration {
        self.frames.iter().map(AnimationFrame::delay).sum()
    }
}

impl std::fmt::Debug for AnimatedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimatedImage")
            .field("frames", &self.frames.len())
            .field("cycle", &self.cycle_duration())
            .finish()
    }
}

/// Position within a looping animation.
#[derive(Debug, Clone)]
pub struct FrameClock {
    delays: Vec<Duration>,
    current: usize,
    elapsed: Duration,
    running: bool,
}

impl FrameClock {
    /// A running clock on the first frame.
    pub fn new(animated: &AnimatedImage) -> Self {
        Self {
            delays: animated.frames.iter().map(AnimationFrame::delay).collect(),
            current: 0,
            elapsed: Duration::ZERO,
            running: true,
        }
    }

    /// Add `delta` of elapsed time. Returns `true` if the current frame changed.
    pub fn advance(&mut self, delta: Duration) -> bool {
        if !self.running || self.delays.is_empty() {
            return false;
        }
        self.elapsed += delta;

        // Whole cycles change nothing; skip them instead of walking frames.
        let cycle: Duration = self.delays.iter().sum();
        let mut changed = false;
        if self.elapsed >= cycle + self.delays[self.current] {
            let cycles = self.elapsed.as_nanos() / cycle.as_nanos();
            self.elapsed -= cycle * (cycles.saturating_sub(1)) as u32;
            changed = true;
        }
        while self.elapsed >= self.delays[self.current] {
            self.elapsed -= self.delays[self.current];
            self.current = (self.current + 1) % self.delays.len();
            changed = true;
        }
        changed
    }

    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// Time until the frame changes, or zero once stopped.
    pub fn time_until_next_frame(&self) -> Duration {
        if !self.running {
            return Duration::ZERO;
        }
        self.delays
            .get(self.current)
            .map_or(Duration::ZERO, |delay| delay.saturating_sub(self.elapsed))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Freeze on the current frame for good.
    pub fn stop(&mut self) {
        self.running = false;
    }
}
