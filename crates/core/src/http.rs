//! Request and response values exchanged with a [`Backend`](crate::Backend)
//!
//! A [`Request`] describes one provider operation as plain data: the logical
//! action name, the HTTP shape (method, path, query, headers, body or form
//! parameters), the statuses it expects and the parser for its body.
//! Remote backends turn it into a signed HTTP exchange; mock backends read
//! the same fields and answer from memory.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::attributes::Attributes;
use crate::error::Result;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Head => http::Method::HEAD,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// Raw response handed to a parser. Header names are lowercase.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-endpoint parser: raw response to attribute mapping
pub type Parser = fn(&RawResponse) -> Result<Attributes>;

/// One provider operation
#[derive(Debug, Clone)]
pub struct Request {
    /// Service the request targets (`ec2`, `s3`, `files`)
    pub service: &'static str,
    /// Logical action name (`RunInstances`, `GetRequestPayment`, ...)
    pub action: String,
    pub method: Method,
    /// Path relative to the backend endpoint, always starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Form parameters (query-protocol APIs); sent url-encoded as the body
    pub params: Vec<(String, String)>,
    pub body: Bytes,
    pub expects: Vec<u16>,
    pub parser: Option<Parser>,
}

impl Request {
    pub fn new(
        service: &'static str,
        action: impl Into<String>,
        method: Method,
        path: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            service,
            action: action.into(),
            method,
            path,
            query: Vec::new(),
            headers: Vec::new(),
            params: Vec::new(),
            body: Bytes::new(),
            expects: vec![200],
            parser: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn expects(mut self, statuses: &[u16]) -> Self {
        self.expects = statuses.to_vec();
        self
    }

    pub fn parser(mut self, parser: Parser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Look up a wire parameter in the form parameters, then the query
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .chain(self.query.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Values of indexed parameters `prefix.1`, `prefix.2`, ... in order
    pub fn indexed_params(&self, prefix: &str) -> Vec<&str> {
        let mut values = Vec::new();
        for n in 1.. {
            match self.get_param(&format!("{prefix}.{n}")) {
                Some(value) => values.push(value),
                None => break,
            }
        }
        values
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn expects_status(&self, status: u16) -> bool {
        self.expects.contains(&status)
    }

    /// Percent-decoded path segments
    pub fn path_segments(&self) -> Vec<String> {
        self.path
            .trim_start_matches('/')
            .splitn(2, '/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect()
    }
}

/// Structured response returned by a backend
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Parsed body (or header metadata) in provider field names
    pub body: Attributes,
    /// Raw payload for object downloads
    pub data: Bytes,
}

impl Response {
    pub fn new(status: u16, body: Attributes) -> Self {
        Self {
            status,
            body,
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = Request::new("s3", "GetService", Method::Get, "");
        assert_eq!(req.path, "/");
        assert_eq!(req.expects, vec![200]);
        assert!(req.parser.is_none());
        assert!(req.body.is_empty());
    }

    #[test]
    fn test_get_param_searches_form_then_query() {
        let req = Request::new("ec2", "RunInstances", Method::Post, "/")
            .param("ImageId", "ami-1")
            .query("Version", "2009-04-04");
        assert_eq!(req.get_param("ImageId"), Some("ami-1"));
        assert_eq!(req.get_param("Version"), Some("2009-04-04"));
        assert_eq!(req.get_param("MinCount"), None);
    }

    #[test]
    fn test_indexed_params() {
        let req = Request::new("ec2", "DescribeVolumes", Method::Post, "/")
            .param("VolumeId.1", "vol-a")
            .param("VolumeId.2", "vol-b")
            .param("VolumeId.4", "vol-d");
        assert_eq!(req.indexed_params("VolumeId"), vec!["vol-a", "vol-b"]);
    }

    #[test]
    fn test_path_segments_decode() {
        let req = Request::new("s3", "GetObject", Method::Get, "/bucket/dir%2Ffile%20name.txt");
        assert_eq!(req.path_segments(), vec!["bucket", "dir/file name.txt"]);
    }

    #[test]
    fn test_raw_response_header_lookup() {
        let mut raw = RawResponse::default();
        raw.headers.insert("etag".to_string(), "\"abc\"".to_string());
        assert_eq!(raw.header("ETag"), Some("\"abc\""));
    }
}
