//! Image download client.
//!
//! A GET-only wrapper over `reqwest` that asks for images, caps the body
//! size and maps failures onto [`NetworkError`](crate::NetworkError).
//!
//! ```ignore
//! use stockicon_net::http::HttpClient;
//!
//! let client = HttpClient::builder().max_body_bytes(256 * 1024).build()?;
//! let png = client
//!     .get("https://example.com/avatar/abc")
//!     .query("s", "32")
//!     .send()
//!     .await?
//!     .error_for_status()?
//!     .bytes()
//!     .await?;
//! ```

mod client;
mod request;
mod response;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use request::HttpRequestBuilder;
pub use response::HttpResponse;
