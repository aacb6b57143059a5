//! HTTP transport
//!
//! [`Transport`] executes one already-signed HTTP request. The default
//! implementation wraps a `reqwest::Client`; tests substitute a mock.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::Profile;
use crate::error::{Error, Result};

/// Executes an HTTP request and returns status, headers and raw body
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// Connection settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub insecure: bool,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            insecure: false,
            user_agent: format!("nimbus/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportOptions {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            timeout: Duration::from_secs(profile.timeout_secs),
            connect_timeout: Duration::from_secs(profile.connect_timeout_secs),
            insecure: profile.insecure,
            ..Default::default()
        }
    }
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(options: &TransportOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(options.insecure)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let request = reqwest::Request::try_from(request)
            .map_err(|e| Error::General(format!("Invalid request: {e}")))?;

        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("Request timeout: {e}"))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let mut result = http::Response::new(body);
        *result.status_mut() = status;
        *result.headers_mut() = headers;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = TransportOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert!(!options.insecure);
        assert!(options.user_agent.starts_with("nimbus/"));
    }

    #[test]
    fn test_options_from_profile() {
        let mut profile = Profile::new("p", crate::Provider::Aws, "ak", "sk");
        profile.timeout_secs = 5;
        let options = TransportOptions::from_profile(&profile);
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(&TransportOptions::default()).is_ok());
    }
}
