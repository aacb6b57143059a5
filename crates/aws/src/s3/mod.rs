//! Amazon S3
//!
//! S3 is a REST API: the method and path select the operation, sub-resources
//! (`?location`, `?requestPayment`) ride in the query, and listings come
//! back as XML. Object metadata is carried in response headers.

mod bucket;
pub mod mock;
mod object;
pub mod parsers;
mod requests;

use std::sync::Arc;

use nb_core::{Attributes, Backend, Collection, Profile, Request, Response, Result};

use crate::client;

pub use bucket::{Bucket, BucketChange};
pub use mock::S3Mock;
pub use object::Object;
pub use requests::ListOptions;

pub(crate) const SERVICE: &str = "s3";

/// Handle to an S3 endpoint
#[derive(Clone)]
pub struct S3 {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for S3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3").finish_non_exhaustive()
    }
}

impl S3 {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Signed connection for an AWS profile
    pub fn connect(profile: &Profile) -> Result<Self> {
        let endpoint = client::s3_endpoint(profile)?;
        Ok(Self::new(client::connect(profile, SERVICE, endpoint)?))
    }

    /// Connection backed by a fresh in-memory S3
    pub fn mock() -> Self {
        Self::new(Arc::new(S3Mock::new()))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub(crate) async fn dispatch(&self, request: Request) -> Result<Response> {
        self.backend.execute(request).await
    }

    pub fn buckets(&self) -> Collection<Bucket> {
        Collection::new(self.clone())
    }

    /// Connection scoped to one bucket, as used by [`Object`]
    pub fn bucket(&self, name: impl Into<String>) -> BucketRef {
        BucketRef {
            s3: self.clone(),
            name: name.into(),
        }
    }
}

/// An S3 connection plus the bucket objects live in
#[derive(Debug, Clone)]
pub struct BucketRef {
    pub s3: S3,
    pub name: String,
}

impl BucketRef {
    pub fn objects(&self) -> Collection<Object> {
        Collection::new(self.clone())
    }

    /// Objects whose keys start with `prefix`, narrowed by the service
    pub fn objects_with_prefix(&self, prefix: impl Into<String>) -> Collection<Object> {
        Collection::scoped(self.clone(), Attributes::new().with("prefix", prefix.into()))
    }
}

/// Path of a bucket or object; key segments are percent-encoded, `/` kept
pub(crate) fn object_path(bucket: &str, key: Option<&str>) -> String {
    match key {
        None => format!("/{bucket}"),
        Some(key) => {
            let encoded: Vec<String> = key
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect();
            format!("/{bucket}/{}", encoded.join("/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_encoding() {
        assert_eq!(object_path("photos", None), "/photos");
        assert_eq!(
            object_path("photos", Some("2009/cat one.jpg")),
            "/photos/2009/cat%20one.jpg"
        );
    }
}
