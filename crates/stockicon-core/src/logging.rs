//! Logging facilities for Stockicon.
//!
//! Stockicon uses the `tracing` crate for instrumentation. Every subsystem logs
//! under its own target so hosts can filter icon diagnostics independently of
//! their own logs. To see logs, install a tracing subscriber in your
//! application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_max_level(tracing::Level::DEBUG)
//!         .init();
//! }
//! ```
//!
//! # Performance Spans
//!
//! [`PerfSpan`] wraps an operation in an `info` level span so its duration
//! shows up in profiling subscribers:
//!
//! ```ignore
//! use stockicon_core::PerfSpan;
//!
//! let _span = PerfSpan::new(span_names::ENSURE_LOADED);
//! // ... materialize icon definitions ...
//! ```

/// Span names used throughout Stockicon for tracing.
///
/// These constants can be used to filter traces for specific operations.
pub mod span_names {
    /// Materializing pending stock definitions for one icon id.
    pub const ENSURE_LOADED: &str = "stockicon::ensure_loaded";
    /// Building a composite icon.
    pub const COMPOSE: &str = "stockicon::compose";
    /// Loading an animation descriptor.
    pub const ANIMATION_LOAD: &str = "stockicon::animation_load";
    /// Fetching a remote image.
    pub const REMOTE_FETCH: &str = "stockicon::remote_fetch";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "stockicon_core::signal";
    /// Icon service facade target.
    pub const SERVICE: &str = "stockicon::service";
    /// Pending stock definition registry target.
    pub const REGISTRY: &str = "stockicon::registry";
    /// Image loading target.
    pub const LOADER: &str = "stockicon::loader";
    /// Icon cache target.
    pub const CACHE: &str = "stockicon::cache";
    /// Composite icon target.
    pub const COMPOSER: &str = "stockicon::composer";
    /// Animation registry and lifecycle target.
    pub const ANIMATION: &str = "stockicon::animation";
    /// Remote image loader target.
    pub const REMOTE: &str = "stockicon::remote";
    /// Performance span target.
    pub const PERF: &str = "stockicon::perf";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "stockicon::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }

    /// Create a performance span tagged with the subject being processed,
    /// such as an icon id or a remote cache key.
    pub fn with_subject(name: &'static str, subject: &str) -> Self {
        let span = tracing::info_span!(
            target: "stockicon::perf",
            "perf",
            operation = name,
            subject = subject
        );
        Self {
            span: span.entered(),
        }
    }
}
