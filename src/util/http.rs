//! Blocking HTTP client for reference data and artifact downloads.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RANGE;
use thiserror::Error;

/// Failure to obtain a remote resource.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("offline mode enabled, refusing to fetch {url}")]
    Offline { url: String },

    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Thin wrapper around a blocking reqwest client that honors offline mode.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    offline: bool,
}

impl HttpClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration, offline: bool) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("appimagelint/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(NetworkError::Client)?;

        Ok(HttpClient { client, offline })
    }

    /// Whether network access is disabled.
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Download a resource, optionally restricted to a byte range (`"bytes=0-512"`).
    pub fn get_bytes_range(&self, url: &str, range: Option<&str>) -> Result<Vec<u8>, NetworkError> {
        if self.offline {
            return Err(NetworkError::Offline {
                url: url.to_string(),
            });
        }

        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }

        let response = request.send().map_err(|source| NetworkError::Request {
            url: url.to_string(),
            source,
        })?;

        if !response.status().is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| NetworkError::Request {
            url: url.to_string(),
            source,
        })?;

        Ok(bytes.to_vec())
    }

    /// Download a resource.
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.get_bytes_range(url, None)
    }

    /// Download a resource as (lossily decoded) text.
    pub fn get_text(&self, url: &str, range: Option<&str>) -> Result<String, NetworkError> {
        let bytes = self.get_bytes_range(url, range)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
