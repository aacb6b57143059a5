//! Rackspace Cloud Files
//!
//! Containers sit directly under the storage URL and objects under their
//! container. Names are percent-encoded as whole path segments, so an
//! object name containing `/` travels as one segment.

mod container;
pub mod mock;
mod object;
pub mod parsers;
mod requests;

use std::sync::Arc;

use nb_core::{
    Backend, Collection, Endpoint, Error, HttpTransport, Profile, Provider, RemoteBackend, Request,
    Response, Result, RetryBackend, TransportOptions,
};

use crate::auth::{self, DEFAULT_AUTH_URL};
use crate::signer::TokenSigner;

pub use container::Container;
pub use mock::FilesMock;
pub use object::Object;
pub use requests::ListOptions;

pub(crate) const SERVICE: &str = "files";

/// Handle to a Cloud Files account
#[derive(Clone)]
pub struct Files {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Files {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Files").finish_non_exhaustive()
    }
}

impl Files {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Authenticate a Rackspace profile and connect to its storage URL.
    ///
    /// The profile's `endpoint`, when set, replaces the storage URL the
    /// auth service hands out.
    pub async fn connect(profile: &Profile) -> Result<Self> {
        if profile.provider != Provider::Rackspace {
            return Err(Error::Config(format!(
                "Profile '{}' is for {}, not rackspace",
                profile.name, profile.provider
            )));
        }

        let transport = HttpTransport::new(&TransportOptions::from_profile(profile))?;
        let auth_url = profile.auth_url.as_deref().unwrap_or(DEFAULT_AUTH_URL);
        let session = auth::authenticate(
            &transport,
            auth_url,
            &profile.access_key,
            &profile.secret_key,
        )
        .await?;

        let storage_url = profile.endpoint.as_deref().unwrap_or(&session.storage_url);
        let endpoint = Endpoint::parse(storage_url)?;
        tracing::debug!(
            profile = %profile.name,
            endpoint = %endpoint.url,
            "Connecting to Cloud Files"
        );

        let signer = Arc::new(TokenSigner::new(session.token));
        let remote = RemoteBackend::new(endpoint, signer, transport);
        Ok(Self::new(Arc::new(RetryBackend::new(
            remote,
            profile.retry_config(),
        ))))
    }

    /// Connection backed by a fresh in-memory account
    pub fn mock() -> Self {
        Self::new(Arc::new(FilesMock::new()))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub(crate) async fn dispatch(&self, request: Request) -> Result<Response> {
        self.backend.execute(request).await
    }

    pub fn containers(&self) -> Collection<Container> {
        Collection::new(self.clone())
    }

    /// Connection scoped to one container, as used by [`Object`]
    pub fn container(&self, name: impl Into<String>) -> ContainerRef {
        ContainerRef {
            files: self.clone(),
            name: name.into(),
        }
    }
}

/// A Files connection plus the container objects live in
#[derive(Debug, Clone)]
pub struct ContainerRef {
    pub files: Files,
    pub name: String,
}

impl ContainerRef {
    pub fn objects(&self) -> Collection<Object> {
        Collection::new(self.clone())
    }
}

/// Path of a container or object, each name encoded as a single segment
pub(crate) fn storage_path(container: &str, object: Option<&str>) -> String {
    let container = urlencoding::encode(container);
    match object {
        None => format!("/{container}"),
        Some(object) => format!("/{container}/{}", urlencoding::encode(object)),
    }
}
