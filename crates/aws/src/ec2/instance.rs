use async_trait::async_trait;

use nb_core::{
    Attributes, Error, Field, FieldType, Lifecycle, Model, Result, Schema, Value,
};

use super::{Ec2, RunInstancesOptions, is_not_found};

pub static INSTANCE: Schema = Schema {
    identity: Field::new("instanceId", "instance_id", FieldType::String),
    fields: &[
        Field::new("amiLaunchIndex", "ami_launch_index", FieldType::Integer),
        Field::new("availabilityZone", "availability_zone", FieldType::String),
        Field::new("dnsName", "dns_name", FieldType::String),
        Field::new("groupSet", "groups", FieldType::List),
        Field::new("imageId", "image_id", FieldType::String),
        Field::new("instanceType", "instance_type", FieldType::String),
        Field::new("kernelId", "kernel_id", FieldType::String),
        Field::new("keyName", "key_name", FieldType::String),
        Field::new("launchTime", "launch_time", FieldType::Timestamp),
        Field::new("monitoring", "monitoring", FieldType::Boolean),
        Field::new("ownerId", "owner_id", FieldType::String),
        Field::new("privateDnsName", "private_dns_name", FieldType::String),
        Field::new("productCodes", "product_codes", FieldType::List),
        Field::new("ramdiskId", "ramdisk_id", FieldType::String),
        Field::new("reason", "reason", FieldType::String),
        Field::new("reservationId", "reservation_id", FieldType::String),
        Field::new("instanceState", "state", FieldType::String),
        Field::new("instanceStateCode", "state_code", FieldType::Integer),
        Field::new("userData", "user_data", FieldType::String),
    ],
};

/// An EC2 server instance
#[derive(Debug, Clone)]
pub struct Instance {
    ec2: Ec2,
    attributes: Attributes,
    lifecycle: Lifecycle,
}

/// Replace a list of single-key maps with the list of their values
fn pluck(wire: &mut Attributes, key: &str, field: &str) {
    let Some(items) = wire.get_list(key) else {
        return;
    };
    let values: Vec<Value> = items
        .iter()
        .map(|item| match item {
            Value::Map(map) => map.get(field).cloned().unwrap_or(Value::Null),
            other => other.clone(),
        })
        .filter(|v| !v.is_null())
        .collect();
    wire.insert(key, values);
}

/// Instance items of a `DescribeInstances` body, each carrying its
/// reservation's `reservationId`, `ownerId` and `groupSet`
pub(crate) fn reservation_items(body: &Attributes) -> Vec<Attributes> {
    let mut items = Vec::new();
    for reservation in body.get_list("reservationSet").unwrap_or_default() {
        let Some(reservation) = reservation.as_map() else {
            continue;
        };
        for instance in reservation.get_list("instancesSet").unwrap_or_default() {
            let Some(instance) = instance.as_map() else {
                continue;
            };
            items.push(with_reservation(instance.clone(), reservation));
        }
    }
    items
}

fn with_reservation(mut item: Attributes, reservation: &Attributes) -> Attributes {
    for key in ["reservationId", "ownerId", "groupSet"] {
        if item.contains_key(key) {
            continue;
        }
        if let Some(value) = reservation.get(key) {
            item.insert(key, value.clone());
        }
    }
    item
}

impl Instance {
    /// Lifecycle state name (`pending`, `running`, `terminated`, ...)
    pub fn state(&self) -> Option<&str> {
        self.attributes.get_str("state")
    }

    pub fn availability_zone(&self) -> Option<&str> {
        self.attributes.get_str("availability_zone")
    }

    pub fn dns_name(&self) -> Option<&str> {
        self.attributes.get_str("dns_name")
    }

    pub fn image_id(&self) -> Option<&str> {
        self.attributes.get_str("image_id")
    }

    pub fn instance_type(&self) -> Option<&str> {
        self.attributes.get_str("instance_type")
    }

    pub fn is_ready(&self) -> bool {
        self.state() == Some("running")
    }

    fn run_options(&self) -> RunInstancesOptions {
        let text = |key: &str| self.attributes.get_str(key).map(str::to_string);
        RunInstancesOptions {
            availability_zone: text("availability_zone"),
            group_ids: self
                .attributes
                .get_list("groups")
                .unwrap_or_default()
                .iter()
                .filter_map(|g| g.as_str().map(str::to_string))
                .collect(),
            instance_type: text("instance_type"),
            kernel_id: text("kernel_id"),
            key_name: text("key_name"),
            monitoring: self.attributes.get_bool("monitoring").unwrap_or(false),
            ramdisk_id: text("ramdisk_id"),
            user_data: text("user_data"),
        }
    }
}

#[async_trait]
impl Model for Instance {
    type Connection = Ec2;

    fn schema() -> &'static Schema {
        &INSTANCE
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

    /// Flatten `instanceState`, `placement` and `monitoring`, and reduce
    /// `groupSet`/`productCodes` to plain id lists
    fn prepare(mut wire: Attributes) -> Attributes {
        if let Some(state) = wire.get_map("instanceState").cloned() {
            wire.insert("instanceState", state.get("name").cloned().unwrap_or(Value::Null));
            if let Some(code) = state.get("code") {
                wire.insert("instanceStateCode", code.clone());
            }
        }
        if let Some(zone) = wire
            .get_map("placement")
            .and_then(|p| p.get("availabilityZone"))
            .cloned()
        {
            wire.insert("availabilityZone", zone);
        }
        if let Some(state) = wire
            .get_map("monitoring")
            .and_then(|m| m.get("state"))
            .cloned()
        {
            wire.insert("monitoring", state);
        }
        pluck(&mut wire, "groupSet", "groupId");
        pluck(&mut wire, "productCodes", "productCode");
        wire
    }

    /// Every instance that has not reached `terminated`
    async fn fetch_all(ec2: &Ec2, _scope: &Attributes) -> Result<Vec<Attributes>> {
        let body = ec2.describe_instances::<&str>(&[]).await?.body;
        Ok(reservation_items(&body)
            .into_iter()
            .filter(|item| {
                item.get_map("instanceState")
                    .and_then(|s| s.get_str("name"))
                    != Some("terminated")
            })
            .collect())
    }

    async fn fetch(ec2: &Ec2, id: &str) -> Result<Option<Attributes>> {
        match ec2.describe_instances(&[id]).await {
            Ok(response) => Ok(reservation_items(&response.body).into_iter().next()),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save(&mut self) -> Result<()> {
        if !self.is_new() {
            return Err(Error::Unsupported(
                "Instances cannot be updated in place".to_string(),
            ));
        }
        let image_id = self
            .image_id()
            .ok_or_else(|| Error::General("image_id is required".to_string()))?
            .to_string();

        let body = self
            .ec2
            .run_instances(&image_id, 1, 1, &self.run_options())
            .await?
            .body;
        let item = body
            .get_list("instancesSet")
            .and_then(|items| items.first())
            .and_then(Value::as_map)
            .cloned()
            .ok_or_else(|| Error::Parse("RunInstances returned no instances".to_string()))?;

        self.merge_wire(with_reservation(item, &body));
        self.lifecycle = Lifecycle::Persisted;
        tracing::debug!(instance_id = ?self.identity(), "Instance launched");
        Ok(())
    }

    async fn destroy(&mut self) -> Result<bool> {
        let id = self.require_identity()?;
        self.ec2.terminate_instances(&[id.as_str()]).await?;
        self.lifecycle = Lifecycle::Destroyed;
        Ok(true)
    }
}
