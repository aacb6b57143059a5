//! Rackspace token authentication
//!
//! One `GET` to the auth service with the username and API key in
//! `X-Auth-User`/`X-Auth-Key`. The answer carries no body; the storage URL
//! and token come back as headers.

use bytes::Bytes;

use nb_core::{Error, Result, Transport};

/// Authentication endpoint used when a profile sets no `auth_url`
pub const DEFAULT_AUTH_URL: &str = "https://auth.api.rackspacecloud.com/v1.0";

/// Endpoints and token handed out by the auth service
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub storage_url: String,
    pub token: String,
    pub cdn_management_url: Option<String>,
    pub server_management_url: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("storage_url", &self.storage_url)
            .field("cdn_management_url", &self.cdn_management_url)
            .field("server_management_url", &self.server_management_url)
            .finish_non_exhaustive()
    }
}

fn header(response: &http::Response<Bytes>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Exchange a username and API key for a storage session
pub async fn authenticate<T: Transport + ?Sized>(
    transport: &T,
    auth_url: &str,
    username: &str,
    api_key: &str,
) -> Result<Session> {
    let request = http::Request::builder()
        .method(http::Method::GET)
        .uri(auth_url)
        .header("X-Auth-User", username)
        .header("X-Auth-Key", api_key)
        .body(Bytes::new())
        .map_err(|e| Error::Config(format!("Invalid auth URL '{auth_url}': {e}")))?;

    tracing::debug!(auth_url = %auth_url, user = %username, "Authenticating with Rackspace");
    let response = transport.send(request).await?;
    let status = response.status().as_u16();
    match status {
        200 | 204 => {}
        401 => {
            return Err(Error::Auth(format!(
                "Rackspace rejected the API key for '{username}'"
            )));
        }
        other => {
            let body = String::from_utf8_lossy(response.body()).into_owned();
            return Err(Error::status(&[200, 204], other, body));
        }
    }

    let required = |name: &str| {
        header(&response, name)
            .ok_or_else(|| Error::Auth(format!("Auth response is missing {name}")))
    };
    Ok(Session {
        storage_url: required("x-storage-url")?,
        token: required("x-auth-token")?,
        cdn_management_url: header(&response, "x-cdn-management-url"),
        server_management_url: header(&response, "x-server-management-url"),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct Canned {
        status: u16,
        headers: Vec<(&'static str, &'static str)>,
        seen: Mutex<Vec<http::Request<Bytes>>>,
    }

    impl Canned {
        fn new(status: u16, headers: &[(&'static str, &'static str)]) -> Self {
            Self {
                status,
                headers: headers.to_vec(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
            self.seen.lock().unwrap().push(request);
            let mut builder = http::Response::builder().status(self.status);
            for (name, value) in &self.headers {
                builder = builder.header(*name, *value);
            }
            Ok(builder.body(Bytes::new()).unwrap())
        }
    }

    #[tokio::test]
    async fn test_authenticate_reads_session_headers() {
        let transport = Canned::new(
            204,
            &[
                ("X-Storage-Url", "https://storage.clouddrive.com/v1/MossoCloudFS_1"),
                ("X-Auth-Token", "tok-123"),
                ("X-CDN-Management-Url", "https://cdn.clouddrive.com/v1/MossoCloudFS_1"),
            ],
        );
        let session = authenticate(&transport, DEFAULT_AUTH_URL, "jdoe", "key")
            .await
            .unwrap();
        assert_eq!(
            session.storage_url,
            "https://storage.clouddrive.com/v1/MossoCloudFS_1"
        );
        assert_eq!(session.token, "tok-123");
        assert!(session.cdn_management_url.is_some());
        assert!(session.server_management_url.is_none());

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].headers()["x-auth-user"], "jdoe");
        assert_eq!(seen[0].headers()["x-auth-key"], "key");
        assert!(!format!("{session:?}").contains("tok-123"));
    }

    #[tokio::test]
    async fn test_rejected_key_is_auth_error() {
        let transport = Canned::new(401, &[]);
        let err = authenticate(&transport, DEFAULT_AUTH_URL, "jdoe", "bad")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_missing_token_header() {
        let transport = Canned::new(204, &[("X-Storage-Url", "https://storage")]);
        assert!(matches!(
            authenticate(&transport, DEFAULT_AUTH_URL, "u", "k").await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let transport = Canned::new(500, &[]);
        let err = authenticate(&transport, DEFAULT_AUTH_URL, "u", "k")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }
}
