use std::time::Duration;

use http::HeaderValue;
use http::header::ACCEPT;

use super::client::HttpClient;
use super::response::HttpResponse;
use crate::error::Result;

const ACCEPT_IMAGES: &str = "image/png,image/gif,image/jpeg;q=0.9,image/*;q=0.8";

/// A pending GET request.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    client: HttpClient,
    url: String,
    query: Vec<(String, String)>,
    accept: HeaderValue,
    timeout: Option<Duration>,
}

impl HttpRequestBuilder {
    pub(crate) fn new(client: HttpClient, url: String) -> Self {
        Self {
            client,
            url,
            query: Vec::new(),
            accept: HeaderValue::from_static(ACCEPT_IMAGES),
            timeout: None,
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Replace the `Accept` header. Invalid values keep the image default.
    pub fn accept(mut self, mime: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(mime) {
            self.accept = value;
        }
        self
    }

    /// Override the client timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The URL that will be requested, query included.
    pub fn url(&self) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.url)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }

    /// Send the request and wait for the response headers.
    pub async fn send(self) -> Result<HttpResponse> {
        let url = self.url()?;
        tracing::debug!(target: "stockicon_net::http", %url, "GET");

        let mut request = self
            .client
            .reqwest_client()
            .get(url)
            .header(ACCEPT, self.accept);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        Ok(HttpResponse::new(
            response,
            self.client.config().max_body_bytes,
        ))
    }
}
