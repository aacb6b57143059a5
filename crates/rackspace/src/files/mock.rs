//! In-memory Cloud Files account
//!
//! Containers and objects are kept in sorted maps, so listings come back
//! in name order and markers behave as they do on the service.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use md5::{Digest, Md5};
use tokio::sync::Mutex;

use nb_core::mock::{reject, respond};
use nb_core::{Attributes, Backend, Error, Method, Request, Response, Result, Value};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const MAX_NAME_LEN: usize = 256;
const DEFAULT_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
struct MockObject {
    data: Bytes,
    content_type: String,
    hash: String,
    last_modified: Timestamp,
}

impl MockObject {
    fn listing(&self, name: &str) -> Attributes {
        Attributes::new()
            .with("name", name)
            .with("hash", self.hash.as_str())
            .with("bytes", self.data.len())
            .with("content_type", self.content_type.as_str())
            .with("last_modified", self.last_modified)
    }

    fn metadata(&self) -> Attributes {
        Attributes::new()
            .with("hash", self.hash.as_str())
            .with("bytes", self.data.len())
            .with("content_type", self.content_type.as_str())
            .with("last_modified", self.last_modified)
    }
}

#[derive(Debug, Default)]
struct MockContainer {
    objects: BTreeMap<String, MockObject>,
}

impl MockContainer {
    fn bytes(&self) -> usize {
        self.objects.values().map(|o| o.data.len()).sum()
    }
}

#[derive(Debug, Default)]
struct FilesState {
    containers: BTreeMap<String, MockContainer>,
}

/// Hex MD5 of the payload, as the service reports it in `ETag`
fn hash(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Names after `marker` with `prefix`, at most `limit` of them
fn page<'a, V>(
    items: &'a BTreeMap<String, V>,
    request: &Request,
) -> impl Iterator<Item = (&'a String, &'a V)> {
    let marker = request.get_param("marker").unwrap_or_default().to_string();
    let prefix = request.get_param("prefix").unwrap_or_default().to_string();
    let limit = request
        .get_param("limit")
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(DEFAULT_LIMIT);
    items
        .iter()
        .filter(move |(name, _)| name.as_str() > marker.as_str() && name.starts_with(&prefix))
        .take(limit)
}

/// In-memory Cloud Files backend
#[derive(Debug, Default)]
pub struct FilesMock {
    state: Mutex<FilesState>,
}

impl FilesMock {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(request: &Request) -> Error {
        let body = if request.method == Method::Head {
            String::new()
        } else {
            "<html><h1>Not Found</h1><p>The resource could not be found.</p></html>".to_string()
        };
        reject(request, 404, body)
    }

    fn target(request: &Request) -> (String, Option<String>) {
        let mut segments = request.path_segments().into_iter();
        let container = segments.next().unwrap_or_default();
        (container, segments.next())
    }

    fn container<'a>(state: &'a mut FilesState, request: &Request) -> Result<&'a mut MockContainer> {
        let (name, _) = Self::target(request);
        state
            .containers
            .get_mut(&name)
            .ok_or_else(|| Self::not_found(request))
    }

    fn head_containers(state: &FilesState, request: &Request) -> Result<Response> {
        let count = state.containers.len();
        let bytes: usize = state.containers.values().map(MockContainer::bytes).sum();
        let body = Attributes::new()
            .with("X-Account-Container-Count", count)
            .with("X-Account-Bytes-Used", bytes);
        Ok(respond(request, 204, body)?
            .with_header("x-account-container-count", count.to_string())
            .with_header("x-account-bytes-used", bytes.to_string()))
    }

    fn get_containers(state: &FilesState, request: &Request) -> Result<Response> {
        let containers: Vec<Value> = page(&state.containers, request)
            .map(|(name, container)| {
                Value::Map(
                    Attributes::new()
                        .with("name", name.as_str())
                        .with("count", container.objects.len())
                        .with("bytes", container.bytes()),
                )
            })
            .collect();
        let status = if containers.is_empty() { 204 } else { 200 };
        respond(request, status, Attributes::new().with("containers", containers))
    }

    fn put_container(state: &mut FilesState, request: &Request) -> Result<Response> {
        let (name, _) = Self::target(request);
        if name.is_empty() || name.contains('/') || name.len() > MAX_NAME_LEN {
            return Err(reject(request, 400, "Bad container name"));
        }
        if state.containers.contains_key(&name) {
            return respond(request, 202, Attributes::new());
        }
        tracing::debug!(container = %name, "Mock container created");
        state.containers.insert(name, MockContainer::default());
        respond(request, 201, Attributes::new())
    }

    fn delete_container(state: &mut FilesState, request: &Request) -> Result<Response> {
        if !Self::container(state, request)?.objects.is_empty() {
            return Err(reject(
                request,
                409,
                "There was a conflict when trying to complete your request.",
            ));
        }
        let (name, _) = Self::target(request);
        state.containers.remove(&name);
        respond(request, 204, Attributes::new())
    }

    fn head_container(state: &mut FilesState, request: &Request) -> Result<Response> {
        let container = Self::container(state, request)?;
        let count = container.objects.len();
        let bytes = container.bytes();
        let body = Attributes::new()
            .with("X-Container-Object-Count", count)
            .with("X-Container-Bytes-Used", bytes);
        Ok(respond(request, 204, body)?
            .with_header("x-container-object-count", count.to_string())
            .with_header("x-container-bytes-used", bytes.to_string()))
    }

    fn get_container(state: &mut FilesState, request: &Request) -> Result<Response> {
        let container = Self::container(state, request)?;
        let objects: Vec<Value> = page(&container.objects, request)
            .map(|(name, object)| Value::Map(object.listing(name)))
            .collect();
        let status = if objects.is_empty() { 204 } else { 200 };
        respond(request, status, Attributes::new().with("objects", objects))
    }

    fn put_object(state: &mut FilesState, request: &Request) -> Result<Response> {
        let (_, name) = Self::target(request);
        let container = Self::container(state, request)?;
        let name = name.ok_or_else(|| reject(request, 400, "Missing object name"))?;
        if name.len() > 1024 {
            return Err(reject(request, 400, "Object name too long"));
        }

        let object = MockObject {
            hash: hash(&request.body),
            data: request.body.clone(),
            content_type: request
                .get_header("Content-Type")
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            last_modified: Timestamp::now(),
        };
        let tag = object.hash.clone();
        container.objects.insert(name, object);

        Ok(respond(request, 201, Attributes::new().with("hash", tag.as_str()))?
            .with_header("etag", tag))
    }

    fn object<'a>(state: &'a mut FilesState, request: &Request) -> Result<&'a MockObject> {
        let (_, name) = Self::target(request);
        let container: &'a MockContainer = Self::container(state, request)?;
        match name.and_then(|n| container.objects.get(&n)) {
            Some(object) => Ok(object),
            None => Err(Self::not_found(request)),
        }
    }

    fn get_object(state: &mut FilesState, request: &Request) -> Result<Response> {
        let object = Self::object(state, request)?;
        let response = respond(request, 200, object.metadata())?;
        Ok(with_object_headers(response, object).with_data(object.data.clone()))
    }

    fn head_object(state: &mut FilesState, request: &Request) -> Result<Response> {
        let object = Self::object(state, request)?;
        let response = respond(request, 200, object.metadata())?;
        Ok(with_object_headers(response, object))
    }

    fn delete_object(state: &mut FilesState, request: &Request) -> Result<Response> {
        let (_, name) = Self::target(request);
        let container = Self::container(state, request)?;
        match name.and_then(|n| container.objects.remove(&n)) {
            Some(_) => respond(request, 204, Attributes::new()),
            None => Err(Self::not_found(request)),
        }
    }
}

fn with_object_headers(response: Response, object: &MockObject) -> Response {
    response
        .with_header("etag", object.hash.as_str())
        .with_header("content-type", object.content_type.as_str())
        .with_header("content-length", object.data.len().to_string())
}

#[async_trait]
impl Backend for FilesMock {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let response = match request.action.as_str() {
            "HeadContainers" => Self::head_containers(state, &request),
            "GetContainers" => Self::get_containers(state, &request),
            "PutContainer" => Self::put_container(state, &request),
            "DeleteContainer" => Self::delete_container(state, &request),
            "HeadContainer" => Self::head_container(state, &request),
            "GetContainer" => Self::get_container(state, &request),
            "PutObject" => Self::put_object(state, &request),
            "GetObject" => Self::get_object(state, &request),
            "HeadObject" => Self::head_object(state, &request),
            "DeleteObject" => Self::delete_object(state, &request),
            other => Err(Error::Unsupported(format!(
                "Files mock does not implement {other}"
            ))),
        }?;

        tracing::debug!(action = %request.action, status = response.status, "Mock Files request served");
        Ok(response)
    }
}
