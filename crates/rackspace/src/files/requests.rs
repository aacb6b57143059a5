use bytes::Bytes;

use nb_core::{Method, Request, Response, Result};

use super::{Files, SERVICE, parsers, storage_path};

/// Listing parameters shared by account and container listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub limit: Option<u32>,
    /// Only names sorting after this one
    pub marker: Option<String>,
    pub prefix: Option<String>,
}

impl ListOptions {
    fn apply(&self, mut request: Request) -> Request {
        request = request.query("format", "json");
        if let Some(limit) = self.limit {
            request = request.query("limit", limit.to_string());
        }
        if let Some(marker) = &self.marker {
            request = request.query("marker", marker.clone());
        }
        if let Some(prefix) = &self.prefix {
            request = request.query("prefix", prefix.clone());
        }
        request
    }
}

impl Files {
    /// Account totals from `X-Account-*` headers
    pub async fn head_containers(&self) -> Result<Response> {
        let request = Request::new(SERVICE, "HeadContainers", Method::Head, "/")
            .expects(&[204])
            .parser(parsers::account_metadata);
        self.dispatch(request).await
    }

    /// List containers; an empty account answers `204`
    pub async fn get_containers(&self, options: &ListOptions) -> Result<Response> {
        let request = Request::new(SERVICE, "GetContainers", Method::Get, "/")
            .expects(&[200, 204])
            .parser(parsers::get_containers);
        self.dispatch(options.apply(request)).await
    }

    /// Create a container; `202` when it already exists
    pub async fn put_container(&self, name: &str) -> Result<Response> {
        let request = Request::new(SERVICE, "PutContainer", Method::Put, storage_path(name, None))
            .expects(&[201, 202]);
        self.dispatch(request).await
    }

    pub async fn delete_container(&self, name: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "DeleteContainer",
            Method::Delete,
            storage_path(name, None),
        )
        .expects(&[204]);
        self.dispatch(request).await
    }

    /// Container totals from `X-Container-*` headers
    pub async fn head_container(&self, name: &str) -> Result<Response> {
        let request = Request::new(SERVICE, "HeadContainer", Method::Head, storage_path(name, None))
            .expects(&[204])
            .parser(parsers::container_metadata);
        self.dispatch(request).await
    }

    /// List a container's objects
    pub async fn get_container(&self, name: &str, options: &ListOptions) -> Result<Response> {
        let request = Request::new(SERVICE, "GetContainer", Method::Get, storage_path(name, None))
            .expects(&[200, 204])
            .parser(parsers::get_container);
        self.dispatch(options.apply(request)).await
    }

    pub async fn put_object(
        &self,
        container: &str,
        object: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> Result<Response> {
        let mut request = Request::new(
            SERVICE,
            "PutObject",
            Method::Put,
            storage_path(container, Some(object)),
        )
        .body(data)
        .expects(&[201])
        .parser(parsers::put_object);
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }
        self.dispatch(request).await
    }

    /// Download an object; the payload is in [`Response::data`]
    pub async fn get_object(&self, container: &str, object: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "GetObject",
            Method::Get,
            storage_path(container, Some(object)),
        )
        .parser(parsers::object_metadata);
        self.dispatch(request).await
    }

    pub async fn head_object(&self, container: &str, object: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "HeadObject",
            Method::Head,
            storage_path(container, Some(object)),
        )
        .parser(parsers::object_metadata);
        self.dispatch(request).await
    }

    pub async fn delete_object(&self, container: &str, object: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "DeleteObject",
            Method::Delete,
            storage_path(container, Some(object)),
        )
        .expects(&[204]);
        self.dispatch(request).await
    }
}
