use async_trait::async_trait;

use nb_core::{
    Attributes, Collection, Error, Field, FieldType, Lifecycle, Model, PendingChanges, Result,
    Schema, Value,
};

use super::{Ec2, Instance, Snapshot, is_not_found};

pub static VOLUME: Schema = Schema {
    identity: Field::new("volumeId", "volume_id", FieldType::String),
    fields: &[
        Field::new("attachTime", "attach_time", FieldType::Timestamp),
        Field::new("availabilityZone", "availability_zone", FieldType::String),
        Field::new("createTime", "create_time", FieldType::Timestamp),
        Field::new("device", "device", FieldType::String),
        Field::new("instanceId", "instance_id", FieldType::String),
        Field::new("size", "size", FieldType::Integer),
        Field::new("snapshotId", "snapshot_id", FieldType::String),
        Field::new("status", "status", FieldType::String),
    ],
};

/// Change recorded on a new volume and applied after it is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeChange {
    Attach { instance_id: String, device: String },
}

/// An EBS volume
#[derive(Debug, Clone)]
pub struct Volume {
    ec2: Ec2,
    attributes: Attributes,
    lifecycle: Lifecycle,
    pending: PendingChanges<VolumeChange>,
}

impl Volume {
    pub fn size(&self) -> Option<i64> {
        self.attributes.get_i64("size")
    }

    pub fn status(&self) -> Option<&str> {
        self.attributes.get_str("status")
    }

    pub fn availability_zone(&self) -> Option<&str> {
        self.attributes.get_str("availability_zone")
    }

    /// Instance the volume is attached to
    pub fn instance_id(&self) -> Option<&str> {
        self.attributes
            .get_str("instance_id")
            .filter(|id| !id.is_empty())
    }

    pub fn device(&self) -> Option<&str> {
        self.attributes.get_str("device")
    }

    pub fn pending(&self) -> &PendingChanges<VolumeChange> {
        &self.pending
    }

    /// Record an attachment to `instance` for the next `save`.
    ///
    /// The volume adopts the instance's availability zone. Only valid before
    /// the volume has been created.
    pub fn stage_attachment(&mut self, instance: &Instance, device: &str) -> Result<()> {
        if !self.is_new() {
            return Err(Error::InvalidState(
                "Attachments can only be staged before the volume is saved".to_string(),
            ));
        }
        let instance_id = instance.require_identity()?;
        if let Some(zone) = instance.availability_zone() {
            self.attributes.insert("availability_zone", zone);
        }
        self.pending.push(VolumeChange::Attach {
            instance_id,
            device: device.to_string(),
        });
        Ok(())
    }

    /// Attach to `instance` now, or at `save` when the volume is new
    pub async fn attach(&mut self, instance: &Instance, device: &str) -> Result<()> {
        if self.is_new() {
            return self.stage_attachment(instance, device);
        }
        let volume_id = self.require_identity()?;
        let instance_id = instance.require_identity()?;
        self.attach_to(&volume_id, &instance_id, device).await
    }

    /// Detach from the current instance; drops staged attachments on a new volume
    pub async fn detach(&mut self) -> Result<()> {
        if self.is_new() {
            self.pending.drain();
            return Ok(());
        }
        let volume_id = self.require_identity()?;
        let body = self.ec2.detach_volume(&volume_id).await?.body;
        self.merge_wire(body.without(&["requestId", "instanceId", "device", "attachTime"]));
        for key in ["instance_id", "device", "attach_time"] {
            self.attributes.remove(key);
        }
        Ok(())
    }

    async fn attach_to(&mut self, volume_id: &str, instance_id: &str, device: &str) -> Result<()> {
        let body = self
            .ec2
            .attach_volume(instance_id, volume_id, device)
            .await?
            .body;
        self.merge_wire(body.without(&["requestId"]));
        Ok(())
    }

    /// Snapshots taken from this volume
    pub fn snapshots(&self) -> Collection<Snapshot> {
        let scope = match self.identity() {
            Some(id) => Attributes::new().with("volume_id", id),
            None => Attributes::new(),
        };
        Collection::scoped(self.ec2.clone(), scope)
    }
}

#[async_trait]
impl Model for Volume {
    type Connection = Ec2;

    fn schema() -> &'static Schema {
        &VOLUME
    }

    fn from_parts(ec2: Ec2, attributes: Attributes, lifecycle: Lifecycle) -> Self {
        Self {
            ec2,
            attributes,
            lifecycle,
            pending: PendingChanges::new(),
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

    /// Lift the first `attachmentSet` entry to the top level; its `status`
    /// replaces the volume's
    fn prepare(mut wire: Attributes) -> Attributes {
        let attachment = match wire.remove("attachmentSet") {
            Some(Value::List(items)) => items.into_iter().next(),
            _ => None,
        };
        if let Some(Value::Map(attachment)) = attachment {
            wire.merge(attachment);
        }
        wire
    }

    async fn fetch_all(ec2: &Ec2, _scope: &Attributes) -> Result<Vec<Attributes>> {
        let mut body = ec2.describe_volumes::<&str>(&[]).await?.body;
        Ok(maps(body.remove("volumeSet")))
    }

    async fn fetch(ec2: &Ec2, id: &str) -> Result<Option<Attributes>> {
        match ec2.describe_volumes(&[id]).await {
            Ok(mut response) => Ok(maps(response.body.remove("volumeSet")).into_iter().next()),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create the volume, then apply staged attachments in order.
    ///
    /// A failed attachment does not undo the create; the error is returned
    /// with the volume already persisted.
    async fn save(&mut self) -> Result<()> {
        if !self.is_new() {
            return Err(Error::Unsupported(
                "Volumes cannot be updated in place".to_string(),
            ));
        }
        let zone = self
            .availability_zone()
            .ok_or_else(|| Error::General("availability_zone is required".to_string()))?
            .to_string();
        let snapshot_id = self
            .attributes
            .get_str("snapshot_id")
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let body = self
            .ec2
            .create_volume(&zone, self.size(), snapshot_id.as_deref())
            .await?
            .body;
        self.merge_wire(body.without(&["requestId"]));
        self.lifecycle = Lifecycle::Persisted;
        let volume_id = self.require_identity()?;
        tracing::debug!(volume_id = %volume_id, "Volume created");

        for change in self.pending.drain() {
            match change {
                VolumeChange::Attach {
                    instance_id,
                    device,
                } => self.attach_to(&volume_id, &instance_id, &device).await?,
            }
        }
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let id = self.require_identity()?;
        self.ec2.delete_volume(&id).await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}

pub(crate) fn maps(list: Option<Value>) -> Vec<Attributes> {
    match list {
        Some(Value::List(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Map(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
