//! Global async runtime.
//!
//! Network operations run on a shared multi-threaded tokio runtime so that
//! synchronous callers (typically a UI thread) can start downloads without
//! owning an executor themselves.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::Runtime;

use crate::error::{NetworkError, Result};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialize the async runtime.
///
/// If not called explicitly, the runtime is created on first use.
pub fn init() -> Result<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("stockicon-net")
        .enable_all()
        .build()
        .map_err(|e| NetworkError::Runtime(e.to_string()))?;
    // A concurrent initializer may have won; its runtime is kept and ours dropped.
    Ok(RUNTIME.get_or_init(|| rt))
}

/// Get a reference to the async runtime, creating it if needed.
pub fn get() -> Result<&'static Runtime> {
    init()
}

/// Block on a future using the global runtime.
///
/// Do not call this from within an async context, as it blocks the
/// current thread.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    Ok(get()?.block_on(future))
}

/// Spawn a future on the global runtime.
pub fn spawn<F>(future: F) -> Result<tokio::task::JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Ok(get()?.spawn(future))
}
