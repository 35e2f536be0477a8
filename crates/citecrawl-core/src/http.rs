//! HTTP layer: shared runtime, client construction, error classification.
//!
//! Requests run on async reqwest inside a shared tokio runtime, but callers
//! see a blocking interface so the crawler stays a single sequential loop.

use std::sync::LazyLock;
use std::time::Duration;

/// Status code the lookup service uses to signal rate limiting
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Shared tokio runtime for HTTP and control-port I/O.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Settings for building an outbound client
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Whole-request timeout (connect + headers + body)
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Proxy URL applied to all schemes, e.g. `socks5h://127.0.0.1:9050`
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            proxy: None,
        }
    }
}

/// Build a fresh client with its own connection pool.
///
/// Every identity rotation builds a new client so no pooled connection
/// from the previous circuit is reused.
pub fn build_client(settings: &HttpSettings) -> Result<reqwest::Client, HttpError> {
    let mut builder = reqwest::Client::builder()
        .timeout(settings.timeout)
        .connect_timeout(settings.connect_timeout)
        .user_agent(concat!("citecrawl/", env!("CARGO_PKG_VERSION")));
    if let Some(proxy) = &settings.proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| HttpError::from_reqwest(&e))?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| HttpError::from_reqwest(&e))
}

/// Error types for outbound requests
#[derive(Debug)]
pub enum HttpError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request did not complete within the configured timeout
    Timeout,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout => f.write_str("request timed out"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Classify a reqwest error, stripping the URL so query strings and
    /// proxy credentials never reach the logs.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: without_url_message(e),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Timeout => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(TOO_MANY_REQUESTS)
    }
}

/// Message of a reqwest error with the request URL removed
fn without_url_message(e: &reqwest::Error) -> String {
    let text = e.to_string();
    match e.url() {
        Some(url) => text
            .replace(&format!(" for url ({url})"), "")
            .replace(url.as_str(), "<url>"),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> HttpError {
        HttpError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn only_429_is_rate_limited() {
        assert!(http_err(429).is_rate_limited());
        assert!(!http_err(403).is_rate_limited());
        assert!(!http_err(500).is_rate_limited());
        assert!(!HttpError::Timeout.is_rate_limited());
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }

    #[test]
    fn display_http_without_status() {
        let err = HttpError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(format!("{err}"), "HTTP error: connection refused");
    }

    #[test]
    fn display_timeout() {
        assert_eq!(format!("{}", HttpError::Timeout), "request timed out");
    }

    #[test]
    fn build_client_with_socks_proxy() {
        let settings = HttpSettings {
            proxy: Some("socks5h://127.0.0.1:9050".to_string()),
            ..Default::default()
        };
        assert!(build_client(&settings).is_ok());
    }
}
