//! Backend seam
//!
//! Every provider connection holds an `Arc<dyn Backend>`. A backend executes
//! one [`Request`] and returns a structured [`Response`]. Two families exist:
//! [`RemoteBackend`], which signs the request, sends it over a [`Transport`]
//! and runs the request's parser, and the provider crates' in-memory mocks.
//! Callers pick one explicitly when building a connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::{Error, Result};
use crate::http::{RawResponse, Request, Response};
use crate::transport::Transport;

/// Executes provider operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request).await
    }
}

/// Adds provider authentication to an outgoing HTTP request
pub trait Signer: Send + Sync {
    fn sign(&self, request: &mut http::Request<Bytes>) -> Result<()>;
}

/// Sends requests unsigned
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsigned;

impl Signer for Unsigned {
    fn sign(&self, _request: &mut http::Request<Bytes>) -> Result<()> {
        Ok(())
    }
}

/// How the first path segment maps onto the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Addressing {
    /// `https://endpoint/bucket/key`
    #[default]
    Path,
    /// `https://bucket.endpoint/key`
    VirtualHost,
}

/// Base URL of a service plus its addressing style
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: Url,
    pub addressing: Addressing,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("Invalid endpoint '{url}': {e}")))?;
        Ok(Self {
            url,
            addressing: Addressing::Path,
        })
    }

    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Absolute URL for a request path and query
    pub fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self.url.clone();
        let mut path = path.to_string();

        if self.addressing == Addressing::VirtualHost {
            let trimmed = path.trim_start_matches('/');
            let (bucket, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
            if !bucket.is_empty() {
                let host = self
                    .host()
                    .ok_or_else(|| Error::Config(format!("Endpoint has no host: {}", self.url)))?;
                url.set_host(Some(&format!("{bucket}.{host}")))
                    .map_err(|e| Error::Config(format!("Invalid bucket host '{bucket}': {e}")))?;
                path = format!("/{rest}");
            }
        }

        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{path}"));

        if query.is_empty() {
            url.set_query(None);
        } else {
            let encoded = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&encoded));
        }
        Ok(url)
    }
}

/// Signed HTTP backend
pub struct RemoteBackend<T: Transport> {
    endpoint: Endpoint,
    signer: Arc<dyn Signer>,
    transport: T,
}

impl<T: Transport> std::fmt::Debug for RemoteBackend<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBackend")
            .field("endpoint", &self.endpoint.url.as_str())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> RemoteBackend<T> {
    pub fn new(endpoint: Endpoint, signer: Arc<dyn Signer>, transport: T) -> Self {
        Self {
            endpoint,
            signer,
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Build the unsigned HTTP request for `request`
    pub fn build_http_request(&self, request: &Request) -> Result<http::Request<Bytes>> {
        let url = self.endpoint.resolve(&request.path, &request.query)?;
        let host = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let mut builder = http::Request::builder()
            .method(http::Method::from(request.method))
            .uri(url.as_str())
            .header(http::header::HOST, host);

        let body = if request.params.is_empty() {
            request.body.clone()
        } else {
            builder = builder.header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            );
            let form = request
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            Bytes::from(form)
        };

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        builder
            .body(body)
            .map_err(|e| Error::General(format!("Failed to build request: {e}")))
    }
}

#[async_trait]
impl<T: Transport> Backend for RemoteBackend<T> {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut http_request = self.build_http_request(&request)?;
        self.signer.sign(&mut http_request)?;

        tracing::debug!(
            service = request.service,
            action = %request.action,
            method = %request.method,
            uri = %http_request.uri(),
            "Dispatching request"
        );

        let http_response = self.transport.send(http_request).await?;
        let raw = into_raw(http_response);

        tracing::debug!(
            service = request.service,
            action = %request.action,
            status = raw.status,
            "Received response"
        );

        if !request.expects_status(raw.status) {
            return Err(Error::status(&request.expects, raw.status, raw.body_text()));
        }

        let body = match request.parser {
            Some(parser) => parser(&raw)?,
            None => Default::default(),
        };

        Ok(Response {
            status: raw.status,
            headers: raw.headers,
            body,
            data: raw.body,
        })
    }
}

fn into_raw(response: http::Response<Bytes>) -> RawResponse {
    let (parts, body) = response.into_parts();
    let mut headers = BTreeMap::new();
    for (key, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            headers.insert(key.as_str().to_ascii_lowercase(), v.to_string());
        }
    }
    RawResponse {
        status: parts.status.as_u16(),
        headers,
        body,
    }
}
