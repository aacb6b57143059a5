use async_trait::async_trait;

use nb_core::{
    Attributes, Collection, Error, Field, FieldType, Lifecycle, Model, Result, Schema,
    Value,
};

use super::{ContainerRef, Files, ListOptions, Object};

/// Names per account listing page
const PAGE_SIZE: u32 = 10_000;

pub static CONTAINER: Schema = Schema {
    identity: Field::new("name", "name", FieldType::String),
    fields: &[
        Field::new("count", "count", FieldType::Integer),
        Field::new("bytes", "bytes", FieldType::Integer),
    ],
};

/// A Cloud Files container
#[derive(Debug, Clone)]
pub struct Container {
    files: Files,
    attributes: Attributes,
    lifecycle: Lifecycle,
}

impl Container {
    pub fn name(&self) -> Option<&str> {
        self.identity()
    }

    /// Number of objects, as of the last listing or fetch
    pub fn count(&self) -> Option<i64> {
        self.attributes.get_i64("count")
    }

    pub fn bytes(&self) -> Option<i64> {
        self.attributes.get_i64("bytes")
    }

    pub fn objects(&self) -> Collection<Object> {
        self.container_ref().objects()
    }

    pub fn container_ref(&self) -> ContainerRef {
        self.files.container(self.name().unwrap_or_default())
    }
}

#[async_trait]
impl Model for Container {
    type Connection = Files;

    fn schema() -> &'static Schema {
        &CONTAINER
    }

    fn from_parts(files: Files, attributes: Attributes, lifecycle: Lifecycle) -> Self {
        Self {
            files,
            attributes,
            lifecycle,
        }
    }

    fn connection(&self) -> &Files {
        &self.files
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

    /// Every container in the account, following full pages by marker
    async fn fetch_all(files: &Files, _scope: &Attributes) -> Result<Vec<Attributes>> {
        let mut containers: Vec<Attributes> = Vec::new();
        let mut options = ListOptions {
            limit: Some(PAGE_SIZE),
            ..Default::default()
        };
        loop {
            let body = files.get_containers(&options).await?.body;
            let page: Vec<Attributes> = body
                .get_list("containers")
                .unwrap_or_default()
                .iter()
                .filter_map(|c| c.as_map().cloned())
                .collect();
            let full = page.len() >= PAGE_SIZE as usize;
            let last = page.last().and_then(|c| c.get_str("name")).map(str::to_string);
            containers.extend(page);

            match last {
                Some(marker) if full => {
                    tracing::debug!(marker = %marker, "Fetching next container page");
                    options.marker = Some(marker);
                }
                _ => break,
            }
        }
        Ok(containers)
    }

    /// Container totals by `HEAD`
    async fn fetch(files: &Files, name: &str) -> Result<Option<Attributes>> {
        match files.head_container(name).await {
            Ok(response) => {
                let body = response.body;
                Ok(Some(
                    Attributes::new()
                        .with("name", name)
                        .with(
                            "count",
                            body.get("X-Container-Object-Count").cloned().unwrap_or(Value::Null),
                        )
                        .with(
                            "bytes",
                            body.get("X-Container-Bytes-Used").cloned().unwrap_or(Value::Null),
                        ),
                ))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save(&mut self) -> Result<()> {
        let name = self
            .name()
            .ok_or_else(|| Error::General("Container name is required".to_string()))?
            .to_string();
        let created = self.files.put_container(&name).await?.status == 201;
        if created {
            self.attributes.insert("count", 0);
            self.attributes.insert("bytes", 0);
        }
        self.lifecycle = Lifecycle::Persisted;
        tracing::debug!(container = %name, created, "Container saved");
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let name = self.require_identity()?;
        self.files.delete_container(&name).await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_destroy() {
        let files = Files::mock();
        let mut containers = files.containers();
        assert!(containers.get("photos").await.unwrap().is_none());

        let mut container = containers
            .create(Attributes::new().with("name", "photos"))
            .await
            .unwrap();
        assert!(!container.is_new());
        assert_eq!(container.count(), Some(0));

        let fetched = containers.get("photos").await.unwrap().unwrap();
        assert_eq!(fetched.attributes(), container.attributes());

        assert!(container.destroy().await.unwrap());
        assert!(containers.get("photos").await.unwrap().is_none());
        assert!(matches!(container.destroy().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_listing_reports_totals() {
        let files = Files::mock();
        files.put_container("a").await.unwrap();
        files.put_container("b").await.unwrap();
        files.put_object("b", "one", "1234", None).await.unwrap();

        let mut containers = files.containers();
        containers.reload().await.unwrap();
        assert_eq!(containers.ids(), vec!["a", "b"]);
        assert_eq!(containers[1].count(), Some(1));
        assert_eq!(containers[1].bytes(), Some(4));
    }

    #[tokio::test]
    async fn test_listing_follows_full_pages() {
        let files = Files::mock();
        let total = PAGE_SIZE as usize + 3;
        for i in 0..total {
            files.put_container(&format!("c{i:05}")).await.unwrap();
        }

        let listed = Container::fetch_all(&files, &Attributes::new()).await.unwrap();
        assert_eq!(listed.len(), total);
        assert_eq!(listed[0].get_str("name"), Some("c00000"));
        assert_eq!(listed[total - 1].get_str("name"), Some("c10002"));
    }

    #[tokio::test]
    async fn test_empty_account_lists_nothing() {
        let mut containers = Files::mock().containers();
        assert!(containers.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_existing_keeps_totals() {
        let files = Files::mock();
        files.put_container("full").await.unwrap();
        files.put_object("full", "o", "xy", None).await.unwrap();

        let mut again = Container::build(files.clone(), Attributes::new().with("name", "full"));
        again.save().await.unwrap();
        assert_eq!(again.count(), None);
        again.reload().await.unwrap();
        assert_eq!(again.count(), Some(1));
    }

    #[tokio::test]
    async fn test_save_requires_name() {
        let mut container = Container::build(Files::mock(), Attributes::new());
        assert!(matches!(container.save().await, Err(Error::General(_))));
    }
}
