//! Error types for image downloads.

use std::fmt;

/// Failure of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The request could not be sent or the body could not be read.
    Request(String),
    /// The URL does not parse.
    InvalidUrl(String),
    /// The request or connect timeout elapsed.
    Timeout,
    /// No connection could be made.
    Connection(String),
    /// The server answered with a non-success status.
    HttpStatus {
        /// Status code.
        status: u16,
        /// Body excerpt, when one was read.
        message: Option<String>,
    },
    /// The body exceeded the client's size limit.
    BodyTooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },
    /// The shared runtime could not be started.
    Runtime(String),
}

impl NetworkError {
    /// Whether the server answered 404.
    ///
    /// Avatar endpoints use this to say "no image for this identity".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }

    /// Whether asking again later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "request failed: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "invalid URL: {msg}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Connection(msg) => write!(f, "connection failed: {msg}"),
            Self::HttpStatus {
                status,
                message: Some(msg),
            } => write!(f, "server returned {status}: {msg}"),
            Self::HttpStatus {
                status,
                message: None,
            } => write!(f, "server returned {status}"),
            Self::BodyTooLarge { limit } => write!(f, "response body exceeds {limit} bytes"),
            Self::Runtime(msg) => write!(f, "async runtime unavailable: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                message: None,
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type for downloads.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(NetworkError::Timeout.to_string(), "request timed out");
        assert_eq!(
            NetworkError::HttpStatus {
                status: 404,
                message: None
            }
            .to_string(),
            "server returned 404"
        );
        assert_eq!(
            NetworkError::BodyTooLarge { limit: 10 }.to_string(),
            "response body exceeds 10 bytes"
        );
    }

    #[test]
    fn test_classification() {
        let not_found = NetworkError::HttpStatus {
            status: 404,
            message: None,
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_transient());

        let unavailable = NetworkError::HttpStatus {
            status: 503,
            message: None,
        };
        assert!(unavailable.is_transient());
        assert!(NetworkError::Timeout.is_transient());
        assert!(!NetworkError::Timeout.is_not_found());
    }

    #[test]
    fn test_from_url_error() {
        let err: NetworkError = url::Url::parse("no scheme").unwrap_err().into();
        assert!(matches!(err, NetworkError::InvalidUrl(_)));
    }
}
