use async_trait::async_trait;
use bytes::Bytes;

use nb_core::{Attributes, Error, Field, FieldType, Lifecycle, Model, Result, Schema, Value};

use super::{ContainerRef, ListOptions};

/// Names per listing page; the service caps listings at this size
const PAGE_SIZE: u32 = 10_000;

pub static OBJECT: Schema = Schema {
    identity: Field::new("name", "name", FieldType::String),
    fields: &[
        Field::new("hash", "hash", FieldType::String),
        Field::new("bytes", "bytes", FieldType::Integer),
        Field::new("content_type", "content_type", FieldType::String),
        Field::new("last_modified", "last_modified", FieldType::Timestamp),
    ],
};

/// An object stored in a Cloud Files container
#[derive(Debug, Clone)]
pub struct Object {
    container: ContainerRef,
    attributes: Attributes,
    lifecycle: Lifecycle,
    body: Option<Bytes>,
}

impl Object {
    pub fn name(&self) -> Option<&str> {
        self.identity()
    }

    pub fn bytes(&self) -> Option<i64> {
        self.attributes.get_i64("bytes")
    }

    pub fn hash(&self) -> Option<&str> {
        self.attributes.get_str("hash")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.attributes.get_str("content_type")
    }

    pub fn container(&self) -> &str {
        &self.container.name
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        let body = body.into();
        self.attributes.insert("bytes", body.len());
        self.body = Some(body);
    }

    pub async fn load_body(&mut self) -> Result<&Bytes> {
        let name = self.require_identity()?;
        let response = self
            .container
            .files
            .get_object(&self.container.name, &name)
            .await?;
        self.merge_wire(response.body);
        Ok(self.body.insert(response.data))
    }
}

#[async_trait]
impl Model for Object {
    type Connection = ContainerRef;

    fn schema() -> &'static Schema {
        &OBJECT
    }

    fn from_parts(container: ContainerRef, attributes: Attributes, lifecycle: Lifecycle) -> Self {
        Self {
            container,
            attributes,
            lifecycle,
            body: None,
        }
    }

    fn connection(&self) -> &ContainerRef {
        &self.container
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

    /// Every object in the container, one full page at a time
    async fn fetch_all(container: &ContainerRef, _scope: &Attributes) -> Result<Vec<Attributes>> {
        let mut objects: Vec<Attributes> = Vec::new();
        let mut options = ListOptions {
            limit: Some(PAGE_SIZE),
            ..Default::default()
        };
        loop {
            let mut body = container
                .files
                .get_container(&container.name, &options)
                .await?
                .body;
            let page: Vec<Attributes> = match body.remove("objects") {
                Some(Value::List(items)) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Map(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            let full = page.len() >= PAGE_SIZE as usize;
            let last = page.last().and_then(|o| o.get_str("name")).map(str::to_string);
            objects.extend(page);

            match last {
                Some(marker) if full => {
                    tracing::debug!(container = %container.name, marker = %marker, "Fetching next listing page");
                    options.marker = Some(marker);
                }
                _ => break,
            }
        }
        Ok(objects)
    }

    /// Object metadata by `HEAD`
    async fn fetch(container: &ContainerRef, name: &str) -> Result<Option<Attributes>> {
        match container.files.head_object(&container.name, name).await {
            Ok(response) => {
                let mut wire = Attributes::new().with("name", name);
                wire.merge(response.body);
                Ok(Some(wire))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Upload the current body; repeat saves overwrite the stored object
    async fn save(&mut self) -> Result<()> {
        let name = self
            .name()
            .ok_or_else(|| Error::General("Object name is required".to_string()))?
            .to_string();
        let body = match (&self.body, self.lifecycle) {
            (Some(body), _) => body.clone(),
            // Fetched by HEAD only; keep the stored payload
            (None, Lifecycle::Persisted) => {
                self.container
                    .files
                    .get_object(&self.container.name, &name)
                    .await?
                    .data
            }
            (None, _) => Bytes::new(),
        };
        let content_type = self.content_type().map(str::to_string);

        let response = self
            .container
            .files
            .put_object(&self.container.name, &name, body.clone(), content_type.as_deref())
            .await?;
        self.merge_wire(response.body);
        self.attributes.insert("bytes", body.len());
        self.lifecycle = Lifecycle::Persisted;
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let name = self.require_identity()?;
        self.container
            .files
            .delete_object(&self.container.name, &name)
            .await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}
