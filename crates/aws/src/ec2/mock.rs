//! In-memory EC2
//!
//! Answers the EC2 request catalog from process memory with mappings keyed
//! exactly like the XML parsers' output. Failed preconditions raise the same
//! 400 status error, with an EC2 error document as body, that the service
//! returns. Resources advance one lifecycle step each time they are described
//! (`pending` instances start `running`, new volumes become `available`).

use async_trait::async_trait;
use indexmap::IndexMap;
use jiff::Timestamp;
use tokio::sync::Mutex;

use nb_core::mock::{reject, respond};
use nb_core::{Attributes, Backend, Error, IdGenerator, Request, Response, Result, Value};

use crate::xml::escape;

pub const ZONES: &[&str] = &["us-east-1a", "us-east-1b", "us-east-1c", "us-east-1d"];
const REGION: &str = "us-east-1";
const OWNER_ID: &str = "123456789012";
const KERNEL_ID: &str = "aki-ba3adfd3";
const RAMDISK_ID: &str = "ari-badbad00";
/// Running instances an account may hold at once
const INSTANCE_LIMIT: usize = 20;

#[derive(Debug)]
struct MockInstance {
    reservation_id: String,
    item: Attributes,
}

#[derive(Debug, Default)]
struct Ec2State {
    /// Reservation envelopes (`reservationId`, `ownerId`, `groupSet`)
    reservations: IndexMap<String, Attributes>,
    instances: IndexMap<String, MockInstance>,
    /// Volumes as described, `attachmentSet` included
    volumes: IndexMap<String, Attributes>,
    snapshots: IndexMap<String, Attributes>,
    snapshot_sizes: IndexMap<String, i64>,
}

fn instance_state(code: i64, name: &str) -> Attributes {
    Attributes::new().with("code", code).with("name", name)
}

fn state_name(item: &Attributes, key: &str) -> String {
    item.get_map(key)
        .and_then(|s| s.get_str("name"))
        .unwrap_or_default()
        .to_string()
}

impl Ec2State {
    /// Move every resource one step along its lifecycle
    fn advance(&mut self) {
        for instance in self.instances.values_mut() {
            match state_name(&instance.item, "instanceState").as_str() {
                "pending" => {
                    let id = instance.item.get_str("instanceId").unwrap_or_default();
                    let dns = format!("ec2-{}.compute-1.amazonaws.com", id.trim_start_matches("i-"));
                    let private_dns = format!("ip-{}.ec2.internal", id.trim_start_matches("i-"));
                    instance.item.insert("dnsName", dns);
                    instance.item.insert("privateDnsName", private_dns);
                    instance.item.insert("instanceState", instance_state(16, "running"));
                }
                "shutting-down" => {
                    instance.item.insert("instanceState", instance_state(48, "terminated"));
                }
                _ => {}
            }
        }
        for volume in self.volumes.values_mut() {
            if volume.get_str("status") == Some("creating") {
                volume.insert("status", "available");
            }
        }
        for snapshot in self.snapshots.values_mut() {
            if snapshot.get_str("status") == Some("pending") {
                snapshot.insert("status", "completed");
                snapshot.insert("progress", "100%");
            }
        }
    }

    fn release_volumes_of(&mut self, instance_id: &str) {
        for volume in self.volumes.values_mut() {
            let attached = volume
                .get_list("attachmentSet")
                .and_then(|a| a.first())
                .and_then(Value::as_map)
                .and_then(|a| a.get_str("instanceId"))
                == Some(instance_id);
            if attached {
                volume.insert("attachmentSet", Value::List(Vec::new()));
                volume.insert("status", "available");
            }
        }
    }
}

/// In-memory EC2 backend
#[derive(Debug, Default)]
pub struct Ec2Mock {
    state: Mutex<Ec2State>,
    ids: IdGenerator,
}

impl Ec2Mock {
    pub fn new() -> Self {
        Self::default()
    }

    fn error(&self, request: &Request, code: &str, message: &str) -> Error {
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response><Errors><Error><Code>{}</Code><Message>{}</Message></Error></Errors><RequestID>{}</RequestID></Response>",
            escape(code),
            escape(message),
            self.ids.request_id()
        );
        reject(request, 400, body)
    }

    fn envelope(&self) -> Attributes {
        Attributes::new().with("requestId", self.ids.request_id())
    }

    fn required<'a>(&self, request: &'a Request, key: &str) -> Result<&'a str> {
        request.get_param(key).ok_or_else(|| {
            self.error(
                request,
                "MissingParameter",
                &format!("The request must contain the parameter {key}"),
            )
        })
    }

    fn run_instances(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let image_id = self.required(request, "ImageId")?;
        let min_count: usize = self.required(request, "MinCount")?.parse().unwrap_or(0);
        let max_count: usize = self.required(request, "MaxCount")?.parse().unwrap_or(0);
        if min_count == 0 || max_count < min_count {
            return Err(self.error(
                request,
                "InvalidParameterValue",
                "MinCount must be at least 1 and no greater than MaxCount",
            ));
        }

        let live = state
            .instances
            .values()
            .filter(|i| state_name(&i.item, "instanceState") != "terminated")
            .count();
        let available = INSTANCE_LIMIT.saturating_sub(live);
        if min_count > available {
            return Err(self.error(
                request,
                "InstanceLimitExceeded",
                &format!(
                    "Your quota allows for {available} more running instance(s). \
                     You requested at least {min_count}"
                ),
            ));
        }

        let zone = request
            .get_param("Placement.AvailabilityZone")
            .unwrap_or(ZONES[0]);
        if !ZONES.contains(&zone) {
            return Err(self.error(
                request,
                "InvalidZone.NotFound",
                &format!("The zone '{zone}' does not exist"),
            ));
        }

        let mut groups = request.indexed_params("SecurityGroup");
        if groups.is_empty() {
            groups.push("default");
        }
        let group_set: Vec<Value> = groups
            .iter()
            .map(|g| Value::Map(Attributes::new().with("groupId", *g)))
            .collect();

        let reservation_id = self.ids.next_id("r");
        let monitoring = request.get_param("Monitoring.Enabled") == Some("true");
        let now = Timestamp::now();

        // Launches exactly MinCount instances; MaxCount is only validated
        let mut instances_set = Vec::with_capacity(min_count);
        for index in 0..min_count {
            let instance_id = self.ids.next_id("i");
            let item = Attributes::new()
                .with("instanceId", instance_id.as_str())
                .with("imageId", image_id)
                .with("instanceState", instance_state(0, "pending"))
                .with("privateDnsName", "")
                .with("dnsName", "")
                .with("reason", "")
                .with("keyName", request.get_param("KeyName").unwrap_or_default())
                .with("amiLaunchIndex", index)
                .with("productCodes", Value::List(Vec::new()))
                .with(
                    "instanceType",
                    request.get_param("InstanceType").unwrap_or("m1.small"),
                )
                .with("launchTime", now)
                .with("placement", Attributes::new().with("availabilityZone", zone))
                .with(
                    "kernelId",
                    request.get_param("KernelId").unwrap_or(KERNEL_ID),
                )
                .with(
                    "ramdiskId",
                    request.get_param("RamdiskId").unwrap_or(RAMDISK_ID),
                )
                .with("monitoring", Attributes::new().with("state", monitoring));

            instances_set.push(Value::Map(item.clone()));
            state.instances.insert(
                instance_id,
                MockInstance {
                    reservation_id: reservation_id.clone(),
                    item,
                },
            );
        }

        let reservation = Attributes::new()
            .with("reservationId", reservation_id.as_str())
            .with("ownerId", OWNER_ID)
            .with("groupSet", Value::List(group_set));
        state
            .reservations
            .insert(reservation_id.clone(), reservation.clone());

        tracing::debug!(
            reservation_id = %reservation_id,
            count = min_count,
            "Mock instances launched"
        );

        let mut body = self.envelope();
        body.merge(reservation);
        body.insert("instancesSet", Value::List(instances_set));
        Ok(body)
    }

    fn unknown_instance(&self, request: &Request, id: &str) -> Error {
        self.error(
            request,
            "InvalidInstanceID.NotFound",
            &format!("The instance ID '{id}' does not exist"),
        )
    }

    fn describe_instances(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        state.advance();

        let ids = request.indexed_params("InstanceId");
        if let Some(missing) = ids.iter().find(|id| !state.instances.contains_key(**id)) {
            return Err(self.unknown_instance(request, missing));
        }

        let mut reservation_set = Vec::new();
        for (reservation_id, envelope) in &state.reservations {
            let items: Vec<Value> = state
                .instances
                .iter()
                .filter(|(id, i)| {
                    &i.reservation_id == reservation_id
                        && (ids.is_empty() || ids.contains(&id.as_str()))
                })
                .map(|(_, i)| Value::Map(i.item.clone()))
                .collect();
            if items.is_empty() {
                continue;
            }
            let mut reservation = envelope.clone();
            reservation.insert("instancesSet", Value::List(items));
            reservation_set.push(Value::Map(reservation));
        }

        Ok(self
            .envelope()
            .with("reservationSet", Value::List(reservation_set)))
    }

    fn terminate_instances(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let ids = request.indexed_params("InstanceId");
        if ids.is_empty() {
            return Err(self.error(
                request,
                "MissingParameter",
                "The request must contain the parameter InstanceId",
            ));
        }
        if let Some(missing) = ids.iter().find(|id| !state.instances.contains_key(**id)) {
            return Err(self.unknown_instance(request, missing));
        }

        let mut instances_set = Vec::new();
        for id in &ids {
            let Some(instance) = state.instances.get_mut(*id) else {
                continue;
            };
            let previous = instance
                .item
                .get_map("instanceState")
                .cloned()
                .unwrap_or_default();
            let current = if state_name(&instance.item, "instanceState") == "terminated" {
                previous.clone()
            } else {
                instance_state(32, "shutting-down")
            };
            instance.item.insert("instanceState", current.clone());
            instances_set.push(Value::Map(
                Attributes::new()
                    .with("instanceId", *id)
                    .with("currentState", current)
                    .with("previousState", previous),
            ));
        }
        for id in &ids {
            state.release_volumes_of(id);
        }

        Ok(self
            .envelope()
            .with("instancesSet", Value::List(instances_set)))
    }

    fn unknown_volume(&self, request: &Request, id: &str) -> Error {
        self.error(
            request,
            "InvalidVolume.NotFound",
            &format!("The volume '{id}' does not exist."),
        )
    }

    fn create_volume(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let zone = self.required(request, "AvailabilityZone")?;
        if !ZONES.contains(&zone) {
            return Err(self.error(
                request,
                "InvalidZone.NotFound",
                &format!("The zone '{zone}' does not exist"),
            ));
        }

        let snapshot_id = request.get_param("SnapshotId");
        let snapshot_size = match snapshot_id {
            Some(id) => match state.snapshot_sizes.get(id) {
                Some(size) => Some(*size),
                None => {
                    return Err(self.error(
                        request,
                        "InvalidSnapshot.NotFound",
                        &format!("The snapshot '{id}' does not exist."),
                    ));
                }
            },
            None => None,
        };

        let size = match request.get_param("Size") {
            Some(size) => size.parse::<i64>().ok(),
            None => snapshot_size,
        };
        let size = match size {
            Some(size) if (1..=1024).contains(&size) => size,
            Some(_) => {
                return Err(self.error(
                    request,
                    "InvalidParameterValue",
                    "Volume size must be between 1 and 1024 GiB",
                ));
            }
            None => {
                return Err(self.error(
                    request,
                    "MissingParameter",
                    "The request must contain the parameter Size or SnapshotId",
                ));
            }
        };

        let volume_id = self.ids.next_id("vol");
        let volume = Attributes::new()
            .with("volumeId", volume_id.as_str())
            .with("size", size)
            .with("snapshotId", snapshot_id.unwrap_or_default())
            .with("availabilityZone", zone)
            .with("status", "creating")
            .with("createTime", Timestamp::now());

        let mut stored = volume.clone();
        stored.insert("attachmentSet", Value::List(Vec::new()));
        state.volumes.insert(volume_id, stored);

        let mut body = self.envelope();
        body.merge(volume);
        Ok(body)
    }

    fn describe_volumes(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        state.advance();

        let ids = request.indexed_params("VolumeId");
        if let Some(missing) = ids.iter().find(|id| !state.volumes.contains_key(**id)) {
            return Err(self.unknown_volume(request, missing));
        }
        let volume_set = state
            .volumes
            .iter()
            .filter(|(id, _)| ids.is_empty() || ids.contains(&id.as_str()))
            .map(|(_, v)| Value::Map(v.clone()))
            .collect();

        Ok(self.envelope().with("volumeSet", Value::List(volume_set)))
    }

    fn delete_volume(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let volume_id = self.required(request, "VolumeId")?;
        let volume = state
            .volumes
            .get(volume_id)
            .ok_or_else(|| self.unknown_volume(request, volume_id))?;
        if volume
            .get_list("attachmentSet")
            .is_some_and(|a| !a.is_empty())
        {
            return Err(self.error(
                request,
                "VolumeInUse",
                &format!("Volume {volume_id} is currently attached"),
            ));
        }
        state.volumes.shift_remove(volume_id);
        Ok(self.envelope().with("return", true))
    }

    fn attach_volume(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let volume_id = self.required(request, "VolumeId")?;
        let instance_id = self.required(request, "InstanceId")?;
        let device = self.required(request, "Device")?;

        let instance_zone = match state.instances.get(instance_id) {
            Some(i) if state_name(&i.item, "instanceState") != "terminated" => i
                .item
                .get_map("placement")
                .and_then(|p| p.get_str("availabilityZone"))
                .unwrap_or_default()
                .to_string(),
            _ => return Err(self.unknown_instance(request, instance_id)),
        };

        let volume = state
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| self.unknown_volume(request, volume_id))?;
        if volume
            .get_list("attachmentSet")
            .is_some_and(|a| !a.is_empty())
        {
            return Err(self.error(
                request,
                "VolumeInUse",
                &format!("{volume_id} is already attached to an instance"),
            ));
        }
        if volume.get_str("availabilityZone") != Some(instance_zone.as_str()) {
            return Err(self.error(
                request,
                "InvalidVolume.ZoneMismatch",
                &format!("The volume '{volume_id}' is not in the same availability zone as instance '{instance_id}'"),
            ));
        }

        let attachment = Attributes::new()
            .with("volumeId", volume_id)
            .with("instanceId", instance_id)
            .with("device", device)
            .with("status", "attaching")
            .with("attachTime", Timestamp::now());

        let mut stored = attachment.clone();
        stored.insert("status", "attached");
        volume.insert("attachmentSet", Value::List(vec![Value::Map(stored)]));
        volume.insert("status", "in-use");

        let mut body = self.envelope();
        body.merge(attachment);
        Ok(body)
    }

    fn detach_volume(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let volume_id = self.required(request, "VolumeId")?;
        let volume = state
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| self.unknown_volume(request, volume_id))?;

        let attachment = volume
            .get_list("attachmentSet")
            .and_then(|a| a.first())
            .and_then(Value::as_map)
            .cloned()
            .ok_or_else(|| {
                self.error(
                    request,
                    "IncorrectState",
                    &format!("Volume '{volume_id}' is in the 'available' state."),
                )
            })?;
        volume.insert("attachmentSet", Value::List(Vec::new()));
        volume.insert("status", "available");

        let mut body = self.envelope();
        body.merge(attachment);
        body.insert("status", "detaching");
        Ok(body)
    }

    fn unknown_snapshot(&self, request: &Request, id: &str) -> Error {
        self.error(
            request,
            "InvalidSnapshot.NotFound",
            &format!("The snapshot '{id}' does not exist."),
        )
    }

    fn create_snapshot(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let volume_id = self.required(request, "VolumeId")?;
        let size = state
            .volumes
            .get(volume_id)
            .ok_or_else(|| self.unknown_volume(request, volume_id))?
            .get_i64("size")
            .unwrap_or_default();

        let snapshot_id = self.ids.next_id("snap");
        let snapshot = Attributes::new()
            .with("snapshotId", snapshot_id.as_str())
            .with("volumeId", volume_id)
            .with("status", "pending")
            .with("startTime", Timestamp::now())
            .with("progress", "");
        state.snapshots.insert(snapshot_id.clone(), snapshot.clone());
        state.snapshot_sizes.insert(snapshot_id, size);

        let mut body = self.envelope();
        body.merge(snapshot);
        Ok(body)
    }

    fn describe_snapshots(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        state.advance();

        let ids = request.indexed_params("SnapshotId");
        if let Some(missing) = ids.iter().find(|id| !state.snapshots.contains_key(**id)) {
            return Err(self.unknown_snapshot(request, missing));
        }

        let mut filters = Vec::new();
        for n in 1.. {
            let Some(name) = request.get_param(&format!("Filter.{n}.Name")) else {
                break;
            };
            let key = match name {
                "volume-id" => "volumeId",
                "snapshot-id" => "snapshotId",
                "status" => "status",
                other => {
                    return Err(self.error(
                        request,
                        "InvalidParameterValue",
                        &format!("The filter '{other}' is invalid"),
                    ));
                }
            };
            filters.push((key, request.indexed_params(&format!("Filter.{n}.Value"))));
        }

        let snapshot_set = state
            .snapshots
            .iter()
            .filter(|(id, _)| ids.is_empty() || ids.contains(&id.as_str()))
            .filter(|(_, s)| {
                filters.iter().all(|(key, values)| {
                    s.get_str(key).is_some_and(|v| values.contains(&v))
                })
            })
            .map(|(_, s)| Value::Map(s.clone()))
            .collect();

        Ok(self
            .envelope()
            .with("snapshotSet", Value::List(snapshot_set)))
    }

    fn delete_snapshot(&self, state: &mut Ec2State, request: &Request) -> Result<Attributes> {
        let snapshot_id = self.required(request, "SnapshotId")?;
        if state.snapshots.shift_remove(snapshot_id).is_none() {
            return Err(self.unknown_snapshot(request, snapshot_id));
        }
        state.snapshot_sizes.shift_remove(snapshot_id);
        Ok(self.envelope().with("return", true))
    }

    fn describe_availability_zones(&self, request: &Request) -> Result<Attributes> {
        let names = request.indexed_params("ZoneName");
        let zones = ZONES
            .iter()
            .filter(|z| names.is_empty() || names.contains(z))
            .map(|z| {
                Value::Map(
                    Attributes::new()
                        .with("zoneName", *z)
                        .with("zoneState", "available")
                        .with("regionName", REGION),
                )
            })
            .collect();
        Ok(self
            .envelope()
            .with("availabilityZoneInfo", Value::List(zones)))
    }
}

#[async_trait]
impl Backend for Ec2Mock {
    async fn execute(&self, request: Request) -> Result<Response> {
        let mut state = self.state.lock().await;
        let state = &mut *state;

        let body = match request.action.as_str() {
            "RunInstances" => self.run_instances(state, &request),
            "DescribeInstances" => self.describe_instances(state, &request),
            "TerminateInstances" => self.terminate_instances(state, &request),
            "CreateVolume" => self.create_volume(state, &request),
            "DescribeVolumes" => self.describe_volumes(state, &request),
            "DeleteVolume" => self.delete_volume(state, &request),
            "AttachVolume" => self.attach_volume(state, &request),
            "DetachVolume" => self.detach_volume(state, &request),
            "CreateSnapshot" => self.create_snapshot(state, &request),
            "DescribeSnapshots" => self.describe_snapshots(state, &request),
            "DeleteSnapshot" => self.delete_snapshot(state, &request),
            "DescribeAvailabilityZones" => self.describe_availability_zones(&request),
            other => Err(Error::Unsupported(format!(
                "EC2 mock does not implement {other}"
            ))),
        }?;

        tracing::debug!(action = %request.action, "Mock EC2 request served");
        respond(&request, 200, body)
    }
}
