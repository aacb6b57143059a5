//! Amazon EC2
//!
//! EC2 uses the query protocol: every operation is a form-encoded POST to
//! the service root carrying `Action` and `Version`, answered with XML.

mod instance;
pub mod mock;
pub mod parsers;
mod requests;
mod snapshot;
mod volume;

use std::sync::Arc;

use nb_core::{Backend, Collection, Error, Profile, Request, Response, Result};

use crate::client;
use crate::xml;

pub use instance::Instance;
pub use mock::Ec2Mock;
pub use requests::RunInstancesOptions;
pub use snapshot::Snapshot;
pub use volume::{Volume, VolumeChange};

/// Query API version sent with every request
pub const API_VERSION: &str = "2009-11-30";

pub(crate) const SERVICE: &str = "ec2";

/// Handle to an EC2 endpoint
#[derive(Clone)]
pub struct Ec2 {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Ec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ec2").finish_non_exhaustive()
    }
}

impl Ec2 {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Signed connection for an AWS profile
    pub fn connect(profile: &Profile) -> Result<Self> {
        let endpoint = client::ec2_endpoint(profile)?;
        Ok(Self::new(client::connect(profile, SERVICE, endpoint)?))
    }

    /// Connection backed by a fresh in-memory EC2
    pub fn mock() -> Self {
        Self::new(Arc::new(Ec2Mock::new()))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub(crate) async fn dispatch(&self, request: Request) -> Result<Response> {
        self.backend.execute(request).await
    }

    pub fn instances(&self) -> Collection<Instance> {
        Collection::new(self.clone())
    }

    pub fn volumes(&self) -> Collection<Volume> {
        Collection::new(self.clone())
    }

    pub fn snapshots(&self) -> Collection<Snapshot> {
        Collection::new(self.clone())
    }
}

/// True when `error` is an EC2 `*.NotFound` client error
pub fn is_not_found(error: &Error) -> bool {
    error.status_code() == Some(400)
        && error
            .body()
            .and_then(xml::error_code)
            .is_some_and(|code| code.ends_with(".NotFound"))
}

/// Indexed wire parameters `prefix.1`, `prefix.2`, ...
pub(crate) fn indexed<S: AsRef<str>>(prefix: &str, values: &[S]) -> Vec<(String, String)> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("{prefix}.{}", i + 1), v.as_ref().to_string()))
        .collect()
}
