use async_trait::async_trait;

use nb_core::{Attributes, Error, Field, FieldType, Lifecycle, Model, Result, Schema};

use super::volume::maps;
use super::{Ec2, is_not_found};

pub static SNAPSHOT: Schema = Schema {
    identity: Field::new("snapshotId", "snapshot_id", FieldType::String),
    fields: &[
        Field::new("progress", "progress", FieldType::String),
        Field::new("startTime", "start_time", FieldType::Timestamp),
        Field::new("status", "status", FieldType::String),
        Field::new("volumeId", "volume_id", FieldType::String),
    ],
};

/// Point-in-time snapshot of an EBS volume
#[derive(Debug, Clone)]
pub struct Snapshot {
    ec2: Ec2,
    attributes: Attributes,
    lifecycle: Lifecycle,
}

impl Snapshot {
    pub fn volume_id(&self) -> Option<&str> {
        self.attributes.get_str("volume_id")
    }

    pub fn status(&self) -> Option<&str> {
        self.attributes.get_str("status")
    }

    pub fn progress(&self) -> Option<&str> {
        self.attributes.get_str("progress")
    }

    pub fn is_ready(&self) -> bool {
        self.status() == Some("completed")
    }
}

#[async_trait]
impl Model for Snapshot {
    type Connection = Ec2;

    fn schema() -> &'static Schema {
        &SNAPSHOT
    }

    fn from_parts(ec2: Ec2, attributes: Attributes, lifecycle: Lifecycle) -> Self {
        Self {
            ec2,
            attributes,
            lifecycle,
        }
    }

    fn connection(&self) -> &Ec2 {
        &self.ec2
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

    /// Snapshots owned by the caller, narrowed to `volume_id` when scoped.
    ///
    /// `DescribeSnapshots` takes no filters at this API version, so the
    /// narrowing happens on the listed snapshots.
    async fn fetch_all(ec2: &Ec2, scope: &Attributes) -> Result<Vec<Attributes>> {
        let mut body = ec2.describe_snapshots::<&str>(&[], &[]).await?.body;
        let snapshots = maps(body.remove("snapshotSet"));
        Ok(match scope.get_str("volume_id") {
            Some(volume_id) => snapshots
                .into_iter()
                .filter(|s| s.get_str("volumeId") == Some(volume_id))
                .collect(),
            None => snapshots,
        })
    }

    async fn fetch(ec2: &Ec2, id: &str) -> Result<Option<Attributes>> {
        match ec2.describe_snapshots(&[id], &[]).await {
            Ok(mut response) => Ok(maps(response.body.remove("snapshotSet")).into_iter().next()),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save(&mut self) -> Result<()> {
        if !self.is_new() {
            return Err(Error::Unsupported(
                "Snapshots cannot be updated in place".to_string(),
            ));
        }
        let volume_id = self
            .volume_id()
            .ok_or_else(|| Error::General("volume_id is required".to_string()))?
            .to_string();
        let body = self.ec2.create_snapshot(&volume_id).await?.body;
        self.merge_wire(body.without(&["requestId"]));
        self.lifecycle = Lifecycle::Persisted;
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let id = self.require_identity()?;
        self.ec2.delete_snapshot(&id).await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}
