use async_trait::async_trait;

use nb_core::{
    Attributes, Collection, Error, Field, FieldType, Lifecycle, Model, PendingChanges, Result,
    Schema, Value,
};

use super::{BucketRef, ListOptions, Object, S3};

pub static BUCKET: Schema = Schema {
    identity: Field::new("Name", "name", FieldType::String),
    fields: &[
        Field::new("CreationDate", "creation_date", FieldType::Timestamp),
        Field::new("LocationConstraint", "location", FieldType::String),
        Field::new("Owner", "owner", FieldType::Map),
        Field::new("Payer", "payer", FieldType::String),
    ],
};

/// Change recorded on a new bucket and applied after it is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketChange {
    Payer(String),
}

/// An S3 bucket
#[derive(Debug, Clone)]
pub struct Bucket {
    s3: S3,
    attributes: Attributes,
    lifecycle: Lifecycle,
    pending: PendingChanges<BucketChange>,
}

impl Bucket {
    pub fn name(&self) -> Option<&str> {
        self.identity()
    }

    pub fn creation_date(&self) -> Option<jiff::Timestamp> {
        self.attributes.get_timestamp("creation_date")
    }

    fn require_name(&self) -> Result<String> {
        self.name()
            .map(str::to_string)
            .ok_or_else(|| Error::General("Bucket name is required".to_string()))
    }

    /// Who pays for requests, read from the bucket's request payment setting
    pub async fn payer(&mut self) -> Result<String> {
        if self.is_new() {
            return Ok(self
                .attributes
                .get_str("payer")
                .unwrap_or("BucketOwner")
                .to_string());
        }
        let name = self.require_identity()?;
        let body = self.s3.get_request_payment(&name).await?.body;
        let payer = body.get_str("Payer").unwrap_or_default().to_string();
        self.attributes.insert("payer", payer.as_str());
        Ok(payer)
    }

    /// Change the payer; deferred to `save` for a new bucket
    pub async fn set_payer(&mut self, payer: &str) -> Result<()> {
        self.attributes.insert("payer", payer);
        if self.is_new() {
            self.pending.push(BucketChange::Payer(payer.to_string()));
            return Ok(());
        }
        let name = self.require_identity()?;
        self.s3.put_request_payment(&name, payer).await?;
        Ok(())
    }

    /// Location constraint; buckets built from a listing fetch it on first use
    pub async fn location(&mut self) -> Result<Option<String>> {
        if let Some(location) = self.attributes.get_str("location") {
            return Ok(Some(location.to_string()));
        }
        if self.is_new() {
            return Ok(None);
        }
        let name = self.require_identity()?;
        let body = self.s3.get_bucket_location(&name).await?.body;
        let location = body
            .get_str("LocationConstraint")
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        if let Some(location) = &location {
            self.attributes.insert("location", location.as_str());
        }
        Ok(location)
    }

    pub fn pending(&self) -> &PendingChanges<BucketChange> {
        &self.pending
    }

    /// Objects stored in this bucket
    pub fn objects(&self) -> Collection<Object> {
        self.bucket_ref().objects()
    }

    /// Connection scoped to this bucket
    pub fn bucket_ref(&self) -> BucketRef {
        self.s3.bucket(self.name().unwrap_or_default())
    }
}

#[async_trait]
impl Model for Bucket {
    type Connection = S3;

    fn schema() -> &'static Schema {
        &BUCKET
    }

    fn from_parts(s3: S3, attributes: Attributes, lifecycle: Lifecycle) -> Self {
        Self {
            s3,
            attributes,
            lifecycle,
            pending: PendingChanges::new(),
        }
    }

    fn connection(&self) -> &S3 {
        &self.s3
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

    /// Every bucket the caller owns, each carrying the listing's `Owner`
    async fn fetch_all(s3: &S3, _scope: &Attributes) -> Result<Vec<Attributes>> {
        let body = s3.get_service().await?.body;
        let owner = body.get("Owner").cloned();
        let buckets = body
            .get_list("Buckets")
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_map)
            .map(|bucket| {
                let mut bucket = bucket.clone();
                if let Some(owner) = &owner {
                    bucket.insert("Owner", owner.clone());
                }
                bucket
            })
            .collect();
        Ok(buckets)
    }

    /// The bucket's name, location constraint and payer
    async fn fetch(s3: &S3, name: &str) -> Result<Option<Attributes>> {
        let options = ListOptions {
            max_keys: Some(0),
            ..Default::default()
        };
        let listing = match s3.get_bucket(name, &options).await {
            Ok(response) => response.body,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        let mut wire = Attributes::new().with("Name", listing.get_str("Name").unwrap_or(name));

        let location = s3.get_bucket_location(name).await?.body;
        if let Some(location) = location.get_str("LocationConstraint").filter(|l| !l.is_empty()) {
            wire.insert("LocationConstraint", location);
        }
        let payment = s3.get_request_payment(name).await?.body;
        if let Some(payer) = payment.get_str("Payer") {
            wire.insert("Payer", payer);
        }
        Ok(Some(wire))
    }

    async fn save(&mut self) -> Result<()> {
        if !self.is_new() {
            return Err(Error::Unsupported(
                "Buckets cannot be updated in place".to_string(),
            ));
        }
        let name = self.require_name()?;
        let location = self.attributes.get_str("location").map(str::to_string);
        self.s3.put_bucket(&name, location.as_deref()).await?;
        self.lifecycle = Lifecycle::Persisted;
        tracing::debug!(bucket = %name, "Bucket created");

        for change in self.pending.drain() {
            match change {
                BucketChange::Payer(payer) => {
                    self.s3.put_request_payment(&name, &payer).await?;
                }
            }
        }
        if self.attributes.get_str("payer").is_none() {
            self.attributes.insert("payer", "BucketOwner");
        }
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let name = self.require_identity()?;
        self.s3.delete_bucket(&name).await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_payer_is_staged_until_save() {
        let s3 = S3::mock();
        let mut bucket = s3
            .buckets()
            .new_model(Attributes::new().with("name", "payer-bucket"));
        bucket.set_payer("Requester").await.unwrap();
        assert_eq!(bucket.pending().len(), 1);
        assert!(s3.get_request_payment("payer-bucket").await.is_err());

        bucket.save().await.unwrap();
        assert!(bucket.pending().is_empty());
        let body = s3.get_request_payment("payer-bucket").await.unwrap().body;
        assert_eq!(body.get_str("Payer"), Some("Requester"));
    }

    #[tokio::test]
    async fn test_payer_on_persisted_bucket() {
        let s3 = S3::mock();
        let mut bucket = s3
            .buckets()
            .create(Attributes::new().with("name", "persisted"))
            .await
            .unwrap();
        assert_eq!(bucket.payer().await.unwrap(), "BucketOwner");

        bucket.set_payer("Requester").await.unwrap();
        let mut fresh = s3.buckets().get("persisted").await.unwrap().unwrap();
        assert_eq!(fresh.payer().await.unwrap(), "Requester");
    }

    #[tokio::test]
    async fn test_location_is_fetched_lazily() {
        let s3 = S3::mock();
        s3.put_bucket("european", Some("EU")).await.unwrap();
        s3.put_bucket("classic", None).await.unwrap();

        let mut european = s3.buckets().get("european").await.unwrap().unwrap();
        assert_eq!(european.location().await.unwrap().as_deref(), Some("EU"));
        assert_eq!(european.attributes().get_str("location"), Some("EU"));

        let mut classic = s3.buckets().get("classic").await.unwrap().unwrap();
        assert_eq!(classic.location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_matches_created_with_location_and_payer() {
        let s3 = S3::mock();
        let mut buckets = s3.buckets();
        let mut bucket = buckets.new_model(
            Attributes::new()
                .with("name", "european")
                .with("location", "EU"),
        );
        bucket.set_payer("Requester").await.unwrap();
        bucket.save().await.unwrap();

        let fetched = buckets.get("european").await.unwrap().unwrap();
        assert_eq!(fetched.attributes(), bucket.attributes());
        assert_eq!(fetched.attributes().get_str("location"), Some("EU"));
        assert_eq!(fetched.attributes().get_str("payer"), Some("Requester"));

        let plain = buckets
            .create(Attributes::new().with("name", "plain"))
            .await
            .unwrap();
        let fetched = buckets.get("plain").await.unwrap().unwrap();
        assert_eq!(fetched.attributes(), plain.attributes());
        assert_eq!(fetched.attributes().get_str("location"), None);
    }

    #[tokio::test]
    async fn test_listing_carries_owner() {
        let s3 = S3::mock();
        s3.put_bucket("owned", None).await.unwrap();
        let mut buckets = s3.buckets();
        let all = buckets.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].attributes().get_map("owner").is_some());
        assert!(all[0].creation_date().is_some());
    }

    #[tokio::test]
    async fn test_destroy_non_empty_bucket_fails() {
        let s3 = S3::mock();
        let mut bucket = s3
            .buckets()
            .create(Attributes::new().with("name", "full"))
            .await
            .unwrap();
        s3.put_object("full", "k", "v", None).await.unwrap();

        let err = bucket.destroy().await.unwrap_err();
        assert_eq!(err.status_code(), Some(409));
        assert!(!bucket.is_new());
        assert!(s3.buckets().get("full").await.unwrap().is_some());
    }
}
