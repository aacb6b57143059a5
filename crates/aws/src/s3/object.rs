use async_trait::async_trait;
use bytes::Bytes;

use nb_core::{Attributes, Error, Field, FieldType, Lifecycle, Model, Result, Schema, Value};

use super::{BucketRef, ListOptions};

pub static OBJECT: Schema = Schema {
    identity: Field::new("Key", "key", FieldType::String),
    fields: &[
        Field::new("ContentType", "content_type", FieldType::String),
        Field::new("ETag", "etag", FieldType::String),
        Field::new("LastModified", "last_modified", FieldType::Timestamp),
        Field::new("Owner", "owner", FieldType::Map),
        Field::new("Size", "size", FieldType::Integer),
        Field::new("StorageClass", "storage_class", FieldType::String),
    ],
};

/// An object stored in an S3 bucket.
///
/// Objects can be saved repeatedly; each save uploads the current body.
#[derive(Debug, Clone)]
pub struct Object {
    bucket: BucketRef,
    attributes: Attributes,
    lifecycle: Lifecycle,
    body: Option<Bytes>,
}

impl Object {
    pub fn key(&self) -> Option<&str> {
        self.identity()
    }

    pub fn size(&self) -> Option<i64> {
        self.attributes.get_i64("size")
    }

    pub fn etag(&self) -> Option<&str> {
        self.attributes.get_str("etag")
    }

    pub fn bucket(&self) -> &str {
        &self.bucket.name
    }

    /// Body set locally or loaded by [`Object::load_body`]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        let body = body.into();
        self.attributes.insert("size", body.len());
        self.body = Some(body);
    }

    /// Download the object's payload
    pub async fn load_body(&mut self) -> Result<&Bytes> {
        let key = self.require_identity()?;
        let response = self.bucket.s3.get_object(&self.bucket.name, &key).await?;
        self.merge_wire(response.body);
        Ok(self.body.insert(response.data))
    }
}

#[async_trait]
impl Model for Object {
    type Connection = BucketRef;

    fn schema() -> &'static Schema {
        &OBJECT
    }

    fn from_parts(bucket: BucketRef, attributes: Attributes, lifecycle: Lifecycle) -> Self {
        Self {
            bucket,
            attributes,
            lifecycle,
            body: None,
        }
    }

    fn connection(&self) -> &BucketRef {
        &self.bucket
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    /// Every object in the bucket, or under the scope's `prefix`, following
    /// truncated listings
    async fn fetch_all(bucket: &BucketRef, scope: &Attributes) -> Result<Vec<Attributes>> {
        let mut objects = Vec::new();
        let mut options = ListOptions {
            prefix: scope.get_str("prefix").map(str::to_string),
            ..Default::default()
        };
        loop {
            let mut body = bucket.s3.get_bucket(&bucket.name, &options).await?.body;
            let page = match body.remove("Contents") {
                Some(Value::List(items)) => items,
                _ => Vec::new(),
            };
            let last = page
                .last()
                .and_then(Value::as_map)
                .and_then(|c| c.get_str("Key"))
                .map(str::to_string);
            objects.extend(page.into_iter().filter_map(|item| match item {
                Value::Map(map) => Some(map),
                _ => None,
            }));

            match last {
                Some(marker) if body.get_bool("IsTruncated") == Some(true) => {
                    tracing::debug!(bucket = %bucket.name, marker = %marker, "Continuing truncated listing");
                    options.marker = Some(marker);
                }
                _ => break,
            }
        }
        Ok(objects)
    }

    /// Object metadata by `HEAD`
    async fn fetch(bucket: &BucketRef, key: &str) -> Result<Option<Attributes>> {
        match bucket.s3.head_object(&bucket.name, key).await {
            Ok(response) => {
                let mut wire = Attributes::new().with("Key", key);
                wire.merge(response.body);
                Ok(Some(wire))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save(&mut self) -> Result<()> {
        let key = self
            .key()
            .ok_or_else(|| Error::General("Object key is required".to_string()))?
            .to_string();
        let body = match (&self.body, self.lifecycle) {
            (Some(body), _) => body.clone(),
            // Fetched by HEAD only; keep the stored payload
            (None, Lifecycle::Persisted) => {
                self.bucket.s3.get_object(&self.bucket.name, &key).await?.data
            }
            (None, _) => Bytes::new(),
        };
        let content_type = self
            .attributes
            .get_str("content_type")
            .map(str::to_string);

        let response = self
            .bucket
            .s3
            .put_object(&self.bucket.name, &key, body.clone(), content_type.as_deref())
            .await?;
        self.merge_wire(response.body);
        self.attributes.insert("size", body.len());
        self.lifecycle = Lifecycle::Persisted;
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let key = self.require_identity()?;
        self.bucket.s3.delete_object(&self.bucket.name, &key).await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::S3;

    async fn bucket() -> BucketRef {
        let s3 = S3::mock();
        s3.put_bucket("objects", None).await.unwrap();
        s3.bucket("objects")
    }

    #[tokio::test]
    async fn test_save_uploads_body() {
        let bucket = bucket().await;
        let mut object = bucket.objects().new_model(
            Attributes::new()
                .with("key", "docs/readme.txt")
                .with("content_type", "text/plain"),
        );
        object.set_body("hello world");
        object.save().await.unwrap();

        assert!(!object.is_new());
        assert!(object.etag().unwrap().starts_with('"'));
        assert_eq!(object.size(), Some(11));

        let mut fetched = bucket.objects().get("docs/readme.txt").await.unwrap().unwrap();
        assert_eq!(fetched.attributes().get_str("content_type"), Some("text/plain"));
        assert_eq!(fetched.etag(), object.etag());
        assert_eq!(fetched.load_body().await.unwrap(), &Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn test_resave_overwrites() {
        let bucket = bucket().await;
        let mut object =
            Object::build(bucket.clone(), Attributes::new().with("key", "counter"));
        object.set_body("1");
        object.save().await.unwrap();
        let first = object.etag().unwrap().to_string();

        object.set_body("2");
        object.save().await.unwrap();
        assert_ne!(object.etag(), Some(first.as_str()));
        assert_eq!(object.load_body().await.unwrap(), &Bytes::from("2"));
    }

    #[tokio::test]
    async fn test_save_after_get_keeps_stored_body() {
        let bucket = bucket().await;
        bucket
            .s3
            .put_object("objects", "report.csv", "a,b\n1,2\n", None)
            .await
            .unwrap();

        let mut object = bucket.objects().get("report.csv").await.unwrap().unwrap();
        assert!(object.body().is_none());
        object.attributes_mut().insert("content_type", "text/csv");
        object.save().await.unwrap();
        assert_eq!(object.size(), Some(8));

        let stored = bucket.s3.get_object("objects", "report.csv").await.unwrap();
        assert_eq!(stored.data, Bytes::from("a,b\n1,2\n"));
        let fetched = bucket.objects().get("report.csv").await.unwrap().unwrap();
        assert_eq!(fetched.attributes().get_str("content_type"), Some("text/csv"));
    }

    #[tokio::test]
    async fn test_listing_in_key_order() {
        let bucket = bucket().await;
        for i in 0..3 {
            bucket
                .s3
                .put_object("objects", &format!("k{i}"), "x", None)
                .await
                .unwrap();
        }
        let listed = Object::fetch_all(&bucket, &Attributes::new()).await.unwrap();
        assert_eq!(listed.len(), 3);

        let mut objects = bucket.objects();
        objects.reload().await.unwrap();
        assert_eq!(objects.ids(), vec!["k0", "k1", "k2"]);
        assert_eq!(objects[0].attributes().get_str("storage_class"), Some("STANDARD"));
    }

    #[tokio::test]
    async fn test_prefix_scope_narrows_listing() {
        let bucket = bucket().await;
        for key in ["2009/a", "2009/b", "2010/a"] {
            bucket.s3.put_object("objects", key, "x", None).await.unwrap();
        }
        let mut objects = bucket.objects_with_prefix("2009/");
        objects.reload().await.unwrap();
        assert_eq!(objects.ids(), vec!["2009/a", "2009/b"]);

        let created = objects.new_model(Attributes::new().with("key", "2011/c"));
        assert_eq!(created.attributes().get("prefix"), None);
    }

    #[tokio::test]
    async fn test_destroy_then_get_is_none() {
        let bucket = bucket().await;
        let mut objects = bucket.objects();
        let mut object = objects
            .create(Attributes::new().with("key", "gone"))
            .await
            .unwrap();
        assert!(object.destroy().await.unwrap());
        assert!(bucket.objects().get("gone").await.unwrap().is_none());
        assert!(matches!(object.load_body().await, Err(Error::InvalidState(_))));
    }
}
