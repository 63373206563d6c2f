//! Shared plumbing for Stockicon.
//!
//! - [`Signal`]: notifications between the engine and the host toolkit
//!   (widget lifecycle, remote image completion)
//! - [`logging`]: `tracing` targets, span names and [`PerfSpan`]

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionId, Signal};
