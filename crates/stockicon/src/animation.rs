//! Animated icons and frame playback.
//!
//! An animation is loaded from an addin resource that is either an animated
//! GIF or a text descriptor listing one frame per line:
//!
//! ```text
//! # frame resource ; delay in milliseconds (optional, default 100)
//! spinner-1.png;80
//! spinner-2.png;80
//! spinner-3.png
//! ```
//!
//! Frame resources may carry `@2x` companions like any other image.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stockicon_core::PerfSpan;
use stockicon_core::logging::{span_names, targets};
use stockicon_render::{AnimatedImage, AnimationFrame, DEFAULT_FRAME_DELAY, FrameClock};

use crate::addin::Addin;
use crate::cache::ResolvedImage;
use crate::error::{IconError, Result};
use crate::loader;

/// An animation: ordered frames plus the spec string that identifies it.
pub struct AnimatedIcon {
    spec: String,
    animation: AnimatedImage,
    frames: Vec<ResolvedImage>,
    poster: ResolvedImage,
}

impl AnimatedIcon {
    /// Load the animation descriptor `descriptor` from `addin`.
    pub fn load(addin: &dyn Addin, descriptor: &str) -> Result<Self> {
        let _span = PerfSpan::with_subject(span_names::ANIMATION_LOAD, descriptor);
        let spec = format!("anim:{}:{}", addin.id(), descriptor);

        let bytes = addin
            .resource(descriptor)
            .ok_or_else(|| IconError::ResourceNotFound {
                addin: addin.id().to_string(),
                resource: descriptor.to_string(),
            })?;
        if bytes.is_empty() {
            return Err(IconError::EmptySource(descriptor.to_string()));
        }

        let icon = if AnimatedImage::is_gif(&bytes) {
            let animation =
                AnimatedImage::from_gif(&bytes).map_err(|e| IconError::decode(descriptor, e))?;
            Self::from_animation(spec, animation)
        } else {
            let text = String::from_utf8_lossy(&bytes);
            let entries = parse_descriptor(descriptor, &text)?;
            let mut frames = Vec::with_capacity(entries.len());
            let mut anim_frames = Vec::with_capacity(entries.len());
            for (resource, delay) in entries {
                let image = loader::load_resource(addin, &resource)?;
                anim_frames.push(AnimationFrame::new(image.base().clone(), delay));
                frames.push(image);
            }
            let animation = AnimatedImage::from_frames(anim_frames)
                .map_err(|e| IconError::decode(descriptor, e))?;
            Self::from_parts(spec, animation, frames)
        };

        tracing::debug!(
            target: targets::ANIMATION,
            spec = icon.spec(),
            frames = icon.frame_count(),
            "loaded animation"
        );
        Ok(icon)
    }

    /// Wrap an already decoded animation.
    pub fn from_animation(spec: impl Into<String>, animation: AnimatedImage) -> Self {
        let frames = animation
            .frames()
            .iter()
            .map(|f| ResolvedImage::new(f.image().clone()))
            .collect();
        Self::from_parts(spec.into(), animation, frames)
    }

    fn from_parts(spec: String, animation: AnimatedImage, frames: Vec<ResolvedImage>) -> Self {
        let poster = match frames.first() {
            Some(first) => first.clone(),
            None => ResolvedImage::new(animation.first_frame().image().clone()),
        };
        Self {
            spec,
            animation,
            frames,
            poster,
        }
    }

    /// Identity of this animation.
    ///
    /// Two bindings showing animations with the same spec show the same
    /// animation.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// A frame by index.
    pub fn frame(&self, index: usize) -> Option<&ResolvedImage> {
        self.frames.get(index)
    }

    /// The still shown while playback is not running.
    pub fn first_frame(&self) -> &ResolvedImage {
        &self.poster
    }

    /// Frame timing.
    pub fn animation(&self) -> &AnimatedImage {
        &self.animation
    }

    /// Start delivering frames to `sink`.
    ///
    /// The first frame is delivered immediately; later frames are delivered
    /// from [`PlaybackHandle::advance`]. Dropping or stopping the handle ends
    /// delivery.
    pub fn start_animation<F>(self: &Arc<Self>, sink: F) -> PlaybackHandle
    where
        F: FnMut(&ResolvedImage) + Send + 'static,
    {
        let mut handle = PlaybackHandle {
            animation: Arc::clone(self),
            clock: FrameClock::new(&self.animation),
            sink: Box::new(sink),
            stopped: false,
        };
        handle.deliver();
        handle
    }
}

impl fmt::Debug for AnimatedIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatedIcon")
            .field("spec", &self.spec)
            .field("frames", &self.frames.len())
            .finish()
    }
}

/// Parse a text descriptor into `(frame resource, delay)` pairs.
pub fn parse_descriptor(descriptor: &str, text: &str) -> Result<Vec<(String, Duration)>> {
    let mut entries = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let invalid = |message: String| IconError::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            line: index + 1,
            message,
        };

        let (resource, delay) = match line.split_once(';') {
            Some((resource, delay)) => {
                let ms: u64 = delay
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("bad delay '{}'", delay.trim())))?;
                (resource.trim(), Duration::from_millis(ms))
            }
            None => (line, DEFAULT_FRAME_DELAY),
        };
        if resource.is_empty() {
            return Err(invalid("missing frame resource".to_string()));
        }
        entries.push((resource.to_string(), delay));
    }

    if entries.is_empty() {
        return Err(IconError::InvalidDescriptor {
            descriptor: descriptor.to_string(),
            line: 0,
            message: "no frames".to_string(),
        });
    }
    Ok(entries)
}

/// Delivers frames of a running animation to a sink.
///
/// At most one handle exists per widget binding. Dropping the handle stops
/// delivery.
pub struct PlaybackHandle {
    animation: Arc<AnimatedIcon>,
    clock: FrameClock,
    sink: Box<dyn FnMut(&ResolvedImage) + Send>,
    stopped: bool,
}

impl PlaybackHandle {
    /// Advance playback by `delta`, delivering a frame if it changed.
    ///
    /// Returns `true` if a frame was delivered.
    pub fn advance(&mut self, delta: Duration) -> bool {
        if self.stopped || !self.clock.advance(delta) {
            return false;
        }
        self.deliver();
        true
    }

    fn deliver(&mut self) {
        if let Some(frame) = self.animation.frame(self.clock.current_frame()) {
            (self.sink)(frame);
        }
    }

    /// Index of the frame last delivered.
    pub fn current_frame(&self) -> usize {
        self.clock.current_frame()
    }

    /// Time until the next frame is due.
    pub fn time_until_next_frame(&self) -> Duration {
        self.clock.time_until_next_frame()
    }

    /// The animation being played.
    pub fn animation(&self) -> &Arc<AnimatedIcon> {
        &self.animation
    }

    /// Whether frames are still being delivered.
    pub fn is_active(&self) -> bool {
        !self.stopped && self.clock.is_running()
    }

    /// Stop delivery. Idempotent.
    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.clock.stop();
            tracing::trace!(target: targets::ANIMATION, spec = self.animation.spec(), "playback stopped");
        }
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("spec", &self.animation.spec())
            .field("frame", &self.clock.current_frame())
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// Animations keyed by icon id.
///
/// Kept apart from the image cache: one id can have both a poster image and
/// a live animation.
#[derive(Default)]
pub struct AnimationRegistry {
    animations: HashMap<String, Arc<AnimatedIcon>>,
}

impl AnimationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `animation` under `id`, replacing any previous one.
    pub fn register(&mut self, id: &str, animation: Arc<AnimatedIcon>) {
        tracing::trace!(target: targets::ANIMATION, id, spec = animation.spec(), "registered animation");
        self.animations.insert(id.to_string(), animation);
    }

    /// The animation registered under `id`.
    pub fn get(&self, id: &str) -> Option<Arc<AnimatedIcon>> {
        self.animations.get(id).cloned()
    }

    /// Whether `id` has an animation.
    pub fn contains(&self, id: &str) -> bool {
        self.animations.contains_key(id)
    }

    /// Number of registered animations.
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    /// Whether no animation is registered.
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

impl fmt::Debug for AnimationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationRegistry")
            .field("len", &self.animations.len())
            .finish()
    }
}

/// An animation of 8x8 solid-color frames.
#[cfg(test)]
pub(crate) fn solid_frames(colors: &[stockicon_render::Color], delay: Duration) -> AnimatedImage {
    let frames = colors
        .iter()
        .map(|c| AnimationFrame::new(stockicon_render::ImageBuffer::from_color(8, 8, *c), delay))
        .collect();
    AnimatedImage::from_frames(frames).unwrap()
}
