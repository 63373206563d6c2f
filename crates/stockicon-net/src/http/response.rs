use bytes::{Bytes, BytesMut};

use crate::error::{NetworkError, Result};

/// Response headers plus a body that has not been read yet.
pub struct HttpResponse {
    inner: reqwest::Response,
    limit: usize,
}

impl HttpResponse {
    pub(crate) fn new(inner: reqwest::Response, limit: usize) -> Self {
        Self { inner, limit }
    }

    pub fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.inner
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Whether the server labelled the body as an image.
    ///
    /// A missing `Content-Type` counts as an image; the decoder decides.
    pub fn is_image(&self) -> bool {
        self.content_type().is_none_or(|mime| mime.starts_with("image/"))
    }

    /// Turn a non-success status into [`NetworkError::HttpStatus`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NetworkError::HttpStatus {
                status: self.status(),
                message: None,
            })
        }
    }

    /// Read the body, failing once it grows past the client's limit.
    pub async fn bytes(mut self) -> Result<Bytes> {
        if self
            .inner
            .content_length()
            .is_some_and(|len| len > self.limit as u64)
        {
            return Err(NetworkError::BodyTooLarge { limit: self.limit });
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = self.inner.chunk().await? {
            if body.len() + chunk.len() > self.limit {
                return Err(NetworkError::BodyTooLarge { limit: self.limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status())
            .field("url", &self.inner.url().as_str())
            .finish()
    }
}
