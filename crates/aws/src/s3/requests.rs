use bytes::Bytes;

use nb_core::{Method, Request, Response, Result};

use super::{S3, SERVICE, object_path, parsers};
use crate::xml::escape;

/// `GET Bucket` listing parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
    pub delimiter: Option<String>,
}

impl ListOptions {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(prefix) = &self.prefix {
            query.push(("prefix", prefix.clone()));
        }
        if let Some(marker) = &self.marker {
            query.push(("marker", marker.clone()));
        }
        if let Some(max_keys) = self.max_keys {
            query.push(("max-keys", max_keys.to_string()));
        }
        if let Some(delimiter) = &self.delimiter {
            query.push(("delimiter", delimiter.clone()));
        }
        query
    }
}

impl S3 {
    /// List the caller's buckets
    pub async fn get_service(&self) -> Result<Response> {
        let request =
            Request::new(SERVICE, "GetService", Method::Get, "/").parser(parsers::get_service);
        self.dispatch(request).await
    }

    /// Create a bucket, optionally constrained to `location`
    pub async fn put_bucket(&self, name: &str, location: Option<&str>) -> Result<Response> {
        let mut request = Request::new(SERVICE, "PutBucket", Method::Put, object_path(name, None));
        if let Some(location) = location.filter(|l| !l.is_empty() && *l != "us-east-1") {
            request = request.body(format!(
                "<CreateBucketConfiguration><LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                escape(location)
            ));
        }
        self.dispatch(request).await
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<Response> {
        let request = Request::new(SERVICE, "DeleteBucket", Method::Delete, object_path(name, None))
            .expects(&[204]);
        self.dispatch(request).await
    }

    /// List objects in a bucket
    pub async fn get_bucket(&self, name: &str, options: &ListOptions) -> Result<Response> {
        let mut request = Request::new(SERVICE, "GetBucket", Method::Get, object_path(name, None))
            .parser(parsers::get_bucket);
        for (key, value) in options.query() {
            request = request.query(key, value);
        }
        self.dispatch(request).await
    }

    pub async fn get_bucket_location(&self, name: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "GetBucketLocation",
            Method::Get,
            object_path(name, None),
        )
        .query("location", "")
        .parser(parsers::get_bucket_location);
        self.dispatch(request).await
    }

    /// Who pays for requests and transfer: `BucketOwner` or `Requester`
    pub async fn get_request_payment(&self, name: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "GetRequestPayment",
            Method::Get,
            object_path(name, None),
        )
        .query("requestPayment", "")
        .parser(parsers::get_request_payment);
        self.dispatch(request).await
    }

    pub async fn put_request_payment(&self, name: &str, payer: &str) -> Result<Response> {
        let body = format!(
            "<RequestPaymentConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\"><Payer>{}</Payer></RequestPaymentConfiguration>",
            escape(payer)
        );
        let request = Request::new(
            SERVICE,
            "PutRequestPayment",
            Method::Put,
            object_path(name, None),
        )
        .query("requestPayment", "")
        .body(body);
        self.dispatch(request).await
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> Result<Response> {
        let mut request = Request::new(
            SERVICE,
            "PutObject",
            Method::Put,
            object_path(bucket, Some(key)),
        )
        .body(data)
        .parser(parsers::put_object);
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }
        self.dispatch(request).await
    }

    /// Download an object; the payload is in [`Response::data`]
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "GetObject",
            Method::Get,
            object_path(bucket, Some(key)),
        )
        .parser(parsers::object_metadata);
        self.dispatch(request).await
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "HeadObject",
            Method::Head,
            object_path(bucket, Some(key)),
        )
        .parser(parsers::object_metadata);
        self.dispatch(request).await
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<Response> {
        let request = Request::new(
            SERVICE,
            "DeleteObject",
            Method::Delete,
            object_path(bucket, Some(key)),
        )
        .expects(&[204]);
        self.dispatch(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use nb_core::{Attributes, Backend};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl Backend for Recorder {
        async fn execute(&self, request: Request) -> Result<Response> {
            let status = request.expects[0];
            self.requests.lock().unwrap().push(request);
            Ok(Response::new(status, Attributes::new()))
        }
    }

    fn recorded() -> (Arc<Recorder>, S3) {
        let recorder = Arc::new(Recorder::default());
        (recorder.clone(), S3::new(recorder))
    }

    #[tokio::test]
    async fn test_put_bucket_location_body() {
        let (recorder, s3) = recorded();
        s3.put_bucket("plain", None).await.unwrap();
        s3.put_bucket("classic", Some("us-east-1")).await.unwrap();
        s3.put_bucket("europe", Some("EU")).await.unwrap();

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].path, "/plain");
        assert!(requests[0].body.is_empty());
        assert!(requests[1].body.is_empty());
        let body = String::from_utf8(requests[2].body.to_vec()).unwrap();
        assert!(body.contains("<LocationConstraint>EU</LocationConstraint>"));
    }

    #[tokio::test]
    async fn test_list_options_query() {
        let (recorder, s3) = recorded();
        let options = ListOptions {
            prefix: Some("logs/".to_string()),
            max_keys: Some(5),
            delimiter: Some("/".to_string()),
            ..Default::default()
        };
        s3.get_bucket("b", &options).await.unwrap();

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].get_param("prefix"), Some("logs/"));
        assert_eq!(requests[0].get_param("max-keys"), Some("5"));
        assert_eq!(requests[0].get_param("delimiter"), Some("/"));
        assert_eq!(requests[0].get_param("marker"), None);
    }

    #[tokio::test]
    async fn test_subresources_and_statuses() {
        let (recorder, s3) = recorded();
        s3.get_request_payment("b").await.unwrap();
        s3.put_request_payment("b", "Requester").await.unwrap();
        s3.delete_object("b", "a b").await.unwrap();
        s3.put_object("b", "k", "data", Some("text/plain")).await.unwrap();

        let requests = recorder.requests.lock().unwrap();
        assert_eq!(requests[0].get_param("requestPayment"), Some(""));
        assert!(
            String::from_utf8(requests[1].body.to_vec())
                .unwrap()
                .contains("<Payer>Requester</Payer>")
        );
        assert_eq!(requests[2].path, "/b/a%20b");
        assert_eq!(requests[2].expects, vec![204]);
        assert_eq!(requests[3].get_header("content-type"), Some("text/plain"));
    }
}
