use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use nb_core::{Method, Request, Response, Result};

use super::{API_VERSION, Ec2, SERVICE, indexed, parsers};

/// Optional `RunInstances` parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunInstancesOptions {
    pub availability_zone: Option<String>,
    pub group_ids: Vec<String>,
    pub instance_type: Option<String>,
    pub kernel_id: Option<String>,
    pub key_name: Option<String>,
    pub monitoring: bool,
    pub ramdisk_id: Option<String>,
    /// Raw user data; base64-encoded on the wire
    pub user_data: Option<String>,
}

impl RunInstancesOptions {
    fn params(&self) -> Vec<(String, String)> {
        let mut params = indexed("SecurityGroup", &self.group_ids);
        let optional = [
            ("Placement.AvailabilityZone", &self.availability_zone),
            ("InstanceType", &self.instance_type),
            ("KernelId", &self.kernel_id),
            ("KeyName", &self.key_name),
            ("RamdiskId", &self.ramdisk_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                params.push((key.to_string(), value.clone()));
            }
        }
        if self.monitoring {
            params.push(("Monitoring.Enabled".to_string(), "true".to_string()));
        }
        if let Some(data) = &self.user_data {
            params.push(("UserData".to_string(), STANDARD.encode(data)));
        }
        params
    }
}

fn action(name: &str) -> Request {
    Request::new(SERVICE, name, Method::Post, "/")
        .param("Action", name)
        .param("Version", API_VERSION)
}

fn filters(filters: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for (i, (name, value)) in filters.iter().enumerate() {
        params.push((format!("Filter.{}.Name", i + 1), name.to_string()));
        params.push((format!("Filter.{}.Value.1", i + 1), value.to_string()));
    }
    params
}

impl Ec2 {
    /// Launch instances of `image_id`.
    ///
    /// The response carries the reservation envelope (`reservationId`,
    /// `ownerId`, `groupSet`) and one `instancesSet` entry per instance.
    pub async fn run_instances(
        &self,
        image_id: &str,
        min_count: u32,
        max_count: u32,
        options: &RunInstancesOptions,
    ) -> Result<Response> {
        let request = action("RunInstances")
            .param("ImageId", image_id)
            .param("MinCount", min_count.to_string())
            .param("MaxCount", max_count.to_string())
            .params(options.params())
            .parser(parsers::run_instances);
        self.dispatch(request).await
    }

    /// Describe reservations; all of them when `instance_ids` is empty
    pub async fn describe_instances<S: AsRef<str> + Sync>(
        &self,
        instance_ids: &[S],
    ) -> Result<Response> {
        let request = action("DescribeInstances")
            .params(indexed("InstanceId", instance_ids))
            .parser(parsers::describe_instances);
        self.dispatch(request).await
    }

    pub async fn terminate_instances<S: AsRef<str> + Sync>(
        &self,
        instance_ids: &[S],
    ) -> Result<Response> {
        let request = action("TerminateInstances")
            .params(indexed("InstanceId", instance_ids))
            .parser(parsers::terminate_instances);
        self.dispatch(request).await
    }

    /// Create a volume of `size` GiB, or from `snapshot_id`
    pub async fn create_volume(
        &self,
        availability_zone: &str,
        size: Option<i64>,
        snapshot_id: Option<&str>,
    ) -> Result<Response> {
        let mut request = action("CreateVolume").param("AvailabilityZone", availability_zone);
        if let Some(size) = size {
            request = request.param("Size", size.to_string());
        }
        if let Some(snapshot_id) = snapshot_id {
            request = request.param("SnapshotId", snapshot_id);
        }
        self.dispatch(request.parser(parsers::create_volume)).await
    }

    pub async fn describe_volumes<S: AsRef<str> + Sync>(
        &self,
        volume_ids: &[S],
    ) -> Result<Response> {
        let request = action("DescribeVolumes")
            .params(indexed("VolumeId", volume_ids))
            .parser(parsers::describe_volumes);
        self.dispatch(request).await
    }

    pub async fn delete_volume(&self, volume_id: &str) -> Result<Response> {
        let request = action("DeleteVolume")
            .param("VolumeId", volume_id)
            .parser(parsers::delete_volume);
        self.dispatch(request).await
    }

    pub async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<Response> {
        let request = action("AttachVolume")
            .param("InstanceId", instance_id)
            .param("VolumeId", volume_id)
            .param("Device", device)
            .parser(parsers::attach_volume);
        self.dispatch(request).await
    }

    pub async fn detach_volume(&self, volume_id: &str) -> Result<Response> {
        let request = action("DetachVolume")
            .param("VolumeId", volume_id)
            .parser(parsers::detach_volume);
        self.dispatch(request).await
    }

    pub async fn create_snapshot(&self, volume_id: &str) -> Result<Response> {
        let request = action("CreateSnapshot")
            .param("VolumeId", volume_id)
            .parser(parsers::create_snapshot);
        self.dispatch(request).await
    }

    /// Describe snapshots by id and/or `(name, value)` filters such as `volume-id`
    pub async fn describe_snapshots<S: AsRef<str> + Sync>(
        &self,
        snapshot_ids: &[S],
        filter: &[(&str, &str)],
    ) -> Result<Response> {
        let request = action("DescribeSnapshots")
            .params(indexed("SnapshotId", snapshot_ids))
            .params(filters(filter))
            .parser(parsers::describe_snapshots);
        self.dispatch(request).await
    }

    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<Response> {
        let request = action("DeleteSnapshot")
            .param("SnapshotId", snapshot_id)
            .parser(parsers::delete_snapshot);
        self.dispatch(request).await
    }

    pub async fn describe_availability_zones<S: AsRef<str> + Sync>(
        &self,
        zone_names: &[S],
    ) -> Result<Response> {
        let request = action("DescribeAvailabilityZones")
            .params(indexed("ZoneName", zone_names))
            .parser(parsers::describe_availability_zones);
        self.dispatch(request).await
    }
}
