//! `X-Auth-Token` request signing

use bytes::Bytes;
use http::HeaderValue;

use nb_core::{Error, Result, Signer};

/// Adds a session token to every storage request
#[derive(Clone)]
pub struct TokenSigner {
    token: String,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Signer for TokenSigner {
    fn sign(&self, request: &mut http::Request<Bytes>) -> Result<()> {
        let value = HeaderValue::from_str(&self.token)
            .map_err(|e| Error::Auth(format!("Invalid auth token: {e}")))?;
        request.headers_mut().insert("x-auth-token", value);
        Ok(())
    }
}
