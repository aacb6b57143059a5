//! In-memory S3
//!
//! Buckets and objects live in sorted maps, so listings come back in key
//! order as they do from S3. Error documents and statuses follow the
//! service: a missing bucket is a 404 `NoSuchBucket`, deleting a bucket
//! that still holds objects is a 409 `BucketNotEmpty`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use md5::{Digest, Md5};
use tokio::sync::Mutex;

use nb_core::mock::{reject, respond};
use nb_core::{Attributes, Backend, Error, IdGenerator, Method, Request, Response, Result, Value};

use crate::xml::{Element, escape};

const OWNER_ID: &str = "8054b847f4a1d73b58d3d9ce7bde5f4d1a8a2ef3d2a3e1e0c6e2a0c0e7f8a9b1";
const OWNER_NAME: &str = "nimbus";
const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

#[derive(Debug, Clone)]
struct MockObject {
    data: Bytes,
    content_type: String,
    etag: String,
    last_modified: Timestamp,
}

impl MockObject {
    fn metadata(&self) -> Attributes {
        Attributes::new()
            .with("ETag", self.etag.as_str())
            .with("Size", self.data.len())
            .with("ContentType", self.content_type.as_str())
            .with("LastModified", self.last_modified)
    }
}

#[derive(Debug)]
struct MockBucket {
    creation_date: Timestamp,
    location: String,
    payer: String,
    objects: BTreeMap<String, MockObject>,
}

#[derive(Debug, Default)]
struct S3State {
    buckets: BTreeMap<String, MockBucket>,
}

fn owner() -> Attributes {
    Attributes::new()
        .with("ID", OWNER_ID)
        .with("DisplayName", OWNER_NAME)
}

/// Quoted hex MD5 of the payload
fn etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}

fn valid_bucket_name(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && !name.ends_with('-')
}

/// In-memory S3 backend
#[derive(Debug, Default)]
pub struct S3Mock {
    state: Mutex<S3State>,
    ids: IdGenerator,
}

impl S3Mock {
    pub fn new() -> Self {
        Self::default()
    }

    fn error(&self, request: &Request, status: u16, code: &str, message: &str) -> Error {
        // HEAD responses carry no body
        if request.method == Method::Head {
            return reject(request, status, String::new());
        }
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{}</Code><Message>{}</Message><Resource>{}</Resource><RequestId>{}</RequestId></Error>",
            escape(code),
            escape(message),
            escape(&request.path),
            self.ids.request_id()
        );
        reject(request, status, body)
    }

    fn no_such_bucket(&self, request: &Request) -> Error {
        self.error(
            request,
            404,
            "NoSuchBucket",
            "The specified bucket does not exist",
        )
    }

    fn malformed(&self, request: &Request) -> Error {
        self.error(
            request,
            400,
            "MalformedXML",
            "The XML you provided was not well-formed or did not validate against our published schema",
        )
    }

    /// Bucket name and optional key from the request path
    fn target(request: &Request) -> (String, Option<String>) {
        let mut segments = request.path_segments().into_iter();
        let bucket = segments.next().unwrap_or_default();
        (bucket, segments.next())
    }

    fn bucket<'a>(&self, state: &'a mut S3State, request: &Request) -> Result<&'a mut MockBucket> {
        let (name, _) = Self::target(request);
        state
            .buckets
            .get_mut(&name)
            .ok_or_else(|| self.no_such_bucket(request))
    }

    /// Text of the first `element` in the request body
    fn body_field(&self, request: &Request, element: &str) -> Result<Option<String>> {
        if request.body.is_empty() {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&request.body);
        let root = Element::parse(&text).map_err(|_| self.malformed(request))?;
        let field = if root.name == element {
            Some(&root)
        } else {
            root.find(element)
        };
        Ok(field.map(|e| e.text.clone()))
    }

    fn get_service(&self, state: &S3State, request: &Request) -> Result<Response> {
        let buckets = state
            .buckets
            .iter()
            .map(|(name, bucket)| {
                Value::Map(
                    Attributes::new()
                        .with("Name", name.as_str())
                        .with("CreationDate", bucket.creation_date),
                )
            })
            .collect::<Vec<_>>();
        let body = Attributes::new()
            .with("Owner", owner())
            .with("Buckets", buckets);
        respond(request, 200, body)
    }

    fn put_bucket(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let (name, _) = Self::target(request);
        if !valid_bucket_name(&name) {
            return Err(self.error(
                request,
                400,
                "InvalidBucketName",
                "The specified bucket is not valid.",
            ));
        }
        if state.buckets.contains_key(&name) {
            return Err(self.error(
                request,
                409,
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded and you already own it.",
            ));
        }
        let location = self
            .body_field(request, "LocationConstraint")?
            .unwrap_or_default();

        tracing::debug!(bucket = %name, location = %location, "Mock bucket created");
        state.buckets.insert(
            name,
            MockBucket {
                creation_date: Timestamp::now(),
                location,
                payer: "BucketOwner".to_string(),
                objects: BTreeMap::new(),
            },
        );
        respond(request, 200, Attributes::new())
    }

    fn delete_bucket(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        if !self.bucket(state, request)?.objects.is_empty() {
            return Err(self.error(
                request,
                409,
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            ));
        }
        let (name, _) = Self::target(request);
        state.buckets.remove(&name);
        respond(request, 204, Attributes::new())
    }

    fn get_bucket(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let (name, _) = Self::target(request);
        let bucket = self.bucket(state, request)?;

        let prefix = request.get_param("prefix").unwrap_or_default();
        let marker = request.get_param("marker").unwrap_or_default();
        let delimiter = request.get_param("delimiter").filter(|d| !d.is_empty());
        let max_keys = request
            .get_param("max-keys")
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(1000);

        let mut contents = Vec::new();
        let mut prefixes: Vec<String> = Vec::new();
        let mut truncated = false;
        for (key, object) in &bucket.objects {
            if key.as_str() <= marker || !key.starts_with(prefix) {
                continue;
            }
            let common = delimiter.and_then(|d| {
                key[prefix.len()..]
                    .find(d)
                    .map(|pos| key[..prefix.len() + pos + d.len()].to_string())
            });
            if let Some(common) = &common {
                if prefixes.last() == Some(common) {
                    continue;
                }
            }
            if contents.len() + prefixes.len() >= max_keys {
                truncated = true;
                break;
            }
            match common {
                Some(common) => prefixes.push(common),
                None => contents.push(Value::Map(
                    Attributes::new()
                        .with("Key", key.as_str())
                        .with("LastModified", object.last_modified)
                        .with("ETag", object.etag.as_str())
                        .with("Size", object.data.len())
                        .with("StorageClass", "STANDARD")
                        .with("Owner", owner()),
                )),
            }
        }

        let mut body = Attributes::new()
            .with("Name", name)
            .with("Prefix", prefix)
            .with("Marker", marker)
            .with("MaxKeys", max_keys);
        if let Some(delimiter) = delimiter {
            body.insert("Delimiter", delimiter);
        }
        body.insert("IsTruncated", truncated);
        body.insert("Contents", contents);
        body.insert(
            "CommonPrefixes",
            prefixes
                .into_iter()
                .map(|p| Value::Map(Attributes::new().with("Prefix", p)))
                .collect::<Vec<_>>(),
        );
        respond(request, 200, body)
    }

    fn get_bucket_location(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let bucket = self.bucket(state, request)?;
        let body = Attributes::new().with("LocationConstraint", bucket.location.as_str());
        respond(request, 200, body)
    }

    fn get_request_payment(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let bucket = self.bucket(state, request)?;
        let body = Attributes::new().with("Payer", bucket.payer.as_str());
        respond(request, 200, body)
    }

    fn put_request_payment(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let payer = self.body_field(request, "Payer")?;
        let bucket = self.bucket(state, request)?;
        match payer.as_deref() {
            Some(payer @ ("BucketOwner" | "Requester")) => bucket.payer = payer.to_string(),
            _ => return Err(self.malformed(request)),
        }
        respond(request, 200, Attributes::new())
    }

    fn put_object(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let (_, key) = Self::target(request);
        let bucket = self.bucket(state, request)?;
        let key = key.ok_or_else(|| self.error(request, 400, "InvalidRequest", "Missing key"))?;

        let object = MockObject {
            etag: etag(&request.body),
            data: request.body.clone(),
            content_type: request
                .get_header("Content-Type")
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            last_modified: Timestamp::now(),
        };
        let tag = object.etag.clone();
        bucket.objects.insert(key, object);

        let response = respond(request, 200, Attributes::new().with("ETag", tag.as_str()))?;
        Ok(response.with_header("etag", tag))
    }

    fn object<'a>(&self, state: &'a mut S3State, request: &Request) -> Result<&'a MockObject> {
        let (_, key) = Self::target(request);
        let bucket: &'a MockBucket = self.bucket(state, request)?;
        match key.and_then(|k| bucket.objects.get(&k)) {
            Some(object) => Ok(object),
            None => Err(self.error(
                request,
                404,
                "NoSuchKey",
                "The specified key does not exist.",
            )),
        }
    }

    fn get_object(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let object = self.object(state, request)?;
        let data = object.data.clone();
        let response = respond(request, 200, object.metadata())?;
        Ok(with_object_headers(response, object).with_data(data))
    }

    fn head_object(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let object = self.object(state, request)?;
        let response = respond(request, 200, object.metadata())?;
        Ok(with_object_headers(response, object))
    }

    fn delete_object(&self, state: &mut S3State, request: &Request) -> Result<Response> {
        let (_, key) = Self::target(request);
        let bucket = self.bucket(state, request)?;
        if let Some(key) = key {
            bucket.objects.remove(&key);
        }
        respond(request, 204, Attributes::new())
    }
}

fn with_object_headers(response: Response, object: &MockObject) -> Response {
    response
        .with_header("etag", object.etag.as_str())
        .with_header("content-type", object.content_type.as_str())
        .with_header("content-length", object.data.len().to_string())
}

#[async_trait]
impl Backend for S3Mock {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let response = match request.action.as_str() {
            "GetService" => self.get_service(state, &request),
            "PutBucket" => self.put_bucket(state, &request),
            "DeleteBucket" => self.delete_bucket(state, &request),
            "GetBucket" => self.get_bucket(state, &request),
            "GetBucketLocation" => self.get_bucket_location(state, &request),
            "GetRequestPayment" => self.get_request_payment(state, &request),
            "PutRequestPayment" => self.put_request_payment(state, &request),
            "PutObject" => self.put_object(state, &request),
            "GetObject" => self.get_object(state, &request),
            "HeadObject" => self.head_object(state, &request),
            "DeleteObject" => self.delete_object(state, &request),
            other => Err(Error::Unsupported(format!(
                "S3 mock does not implement {other}"
            ))),
        }?;

        tracing::debug!(action = %request.action, status = response.status, "Mock S3 request served");
        Ok(response)
    }
}
