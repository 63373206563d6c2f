//! Remote image downloads for Stockicon.
//!
//! [`http::HttpClient`] fetches images with a size cap, and [`runtime`]
//! owns the tokio runtime downloads run on, so the UI thread can start a
//! fetch without an executor of its own.
//!
//! ```ignore
//! use stockicon_net::{http::HttpClient, runtime};
//!
//! let client = HttpClient::builder().build()?;
//! runtime::spawn(async move {
//!     let response = client.get("https://example.com/a.png").send().await;
//!     // post the result back to the UI thread
//! })?;
//! ```

mod error;
pub mod http;
pub mod runtime;

pub use error::{NetworkError, Result};
