//! EC2 instance and volume commands

use anyhow::{Context as _, Result};
use clap::Subcommand;
use serde::Serialize;

use nb_aws::{Ec2, Instance, RunInstancesOptions, Volume};
use nb_core::{Attributes, Model, Value};

use crate::exit_code::UsageError;
use crate::output::{Formatter, format_time};

#[derive(Subcommand, Debug)]
pub enum Ec2Commands {
    /// Launch instances from an image
    Run(RunArgs),

    /// List instances that have not terminated
    Ls,

    /// Terminate instances
    Terminate(TerminateArgs),

    /// List EBS volumes
    Volumes,

    /// Create a volume, optionally attaching it to an instance
    CreateVolume(CreateVolumeArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Image to launch, e.g. ami-5ee70037
    pub image_id: String,

    /// Instance type, e.g. m1.small
    #[arg(long = "type")]
    pub instance_type: Option<String>,

    /// Availability zone to place the instances in
    #[arg(long)]
    pub zone: Option<String>,

    #[arg(long)]
    pub key_name: Option<String>,

    /// Number of instances to launch
    #[arg(long, default_value_t = 1)]
    pub count: u32,
}

#[derive(clap::Args, Debug)]
pub struct TerminateArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct CreateVolumeArgs {
    /// Availability zone; taken from the instance with --attach
    #[arg(long)]
    pub zone: Option<String>,

    /// Size in GiB
    #[arg(long)]
    pub size: Option<i64>,

    /// Snapshot to restore from
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Instance to attach the new volume to
    #[arg(long, requires = "device")]
    pub attach: Option<String>,

    /// Device name for the attachment, e.g. /dev/sdh
    #[arg(long)]
    pub device: Option<String>,
}

#[derive(Serialize)]
struct InstanceListOutput {
    instances: Vec<Attributes>,
}

#[derive(Serialize)]
struct VolumeListOutput {
    volumes: Vec<Attributes>,
}

pub async fn run(cmd: Ec2Commands, ec2: &Ec2, formatter: &Formatter) -> Result<()> {
    match cmd {
        Ec2Commands::Run(args) => run_instances(ec2, args, formatter).await,
        Ec2Commands::Ls => list_instances(ec2, formatter).await,
        Ec2Commands::Terminate(args) => terminate(ec2, args, formatter).await,
        Ec2Commands::Volumes => list_volumes(ec2, formatter).await,
        Ec2Commands::CreateVolume(args) => create_volume(ec2, args, formatter).await,
    }
}

fn instance_rows(formatter: &Formatter, instances: &[Instance]) -> Vec<Vec<String>> {
    instances
        .iter()
        .map(|instance| {
            vec![
                formatter.style_name(instance.identity().unwrap_or_default()),
                formatter.style_state(instance.state().unwrap_or("-")),
                instance.image_id().unwrap_or("-").to_string(),
                instance.instance_type().unwrap_or("-").to_string(),
                instance.availability_zone().unwrap_or("-").to_string(),
                instance.dns_name().filter(|d| !d.is_empty()).unwrap_or("-").to_string(),
            ]
        })
        .collect()
}

const INSTANCE_HEADERS: &[&str] = &["ID", "STATE", "IMAGE", "TYPE", "ZONE", "DNS"];

async fn run_instances(ec2: &Ec2, args: RunArgs, formatter: &Formatter) -> Result<()> {
    if args.count == 0 {
        return Err(UsageError("--count must be at least 1".to_string()).into());
    }
    let options = RunInstancesOptions {
        availability_zone: args.zone,
        instance_type: args.instance_type,
        key_name: args.key_name,
        ..Default::default()
    };
    let body = ec2
        .run_instances(&args.image_id, args.count, args.count, &options)
        .await
        .with_context(|| format!("Failed to launch {}", args.image_id))?
        .body;

    let reservation = body.get_str("reservationId").map(str::to_string);
    let instances: Vec<Instance> = body
        .get_list("instancesSet")
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_map)
        .map(|item| {
            let mut item = item.clone();
            if let Some(reservation) = &reservation {
                item.insert("reservationId", reservation.as_str());
            }
            Instance::from_wire(ec2.clone(), item)
        })
        .collect();
    tracing::info!(
        image_id = %args.image_id,
        count = instances.len(),
        reservation = ?reservation,
        "Instances launched"
    );

    if formatter.is_json() {
        formatter.json(&InstanceListOutput {
            instances: instances.iter().map(|i| i.attributes().clone()).collect(),
        });
    } else {
        formatter.table(INSTANCE_HEADERS, instance_rows(formatter, &instances));
    }
    Ok(())
}

async fn list_instances(ec2: &Ec2, formatter: &Formatter) -> Result<()> {
    let mut instances = ec2.instances();
    let instances = instances.all().await.context("Failed to list instances")?;

    if formatter.is_json() {
        formatter.json(&InstanceListOutput {
            instances: instances.iter().map(|i| i.attributes().clone()).collect(),
        });
    } else {
        formatter.table(INSTANCE_HEADERS, instance_rows(formatter, instances));
    }
    Ok(())
}

async fn existing_instance(ec2: &Ec2, id: &str) -> Result<Instance> {
    ec2.instances()
        .get(id)
        .await?
        .ok_or_else(|| nb_core::Error::NotFound(format!("Instance '{id}'")).into())
}

async fn terminate(ec2: &Ec2, args: TerminateArgs, formatter: &Formatter) -> Result<()> {
    for id in &args.ids {
        let mut instance = existing_instance(ec2, id).await?;
        instance
            .destroy()
            .await
            .with_context(|| format!("Failed to terminate {id}"))?;
        tracing::info!(instance_id = %id, "Instance terminated");
        if !formatter.is_json() {
            let id = formatter.style_name(id);
            formatter.success(&format!("Terminating '{id}'."));
        }
    }
    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "terminated": args.ids }));
    }
    Ok(())
}

fn volume_row(formatter: &Formatter, volume: &Volume) -> Vec<String> {
    let created = volume.attributes().get_timestamp("create_time");
    vec![
        formatter.style_name(volume.identity().unwrap_or_default()),
        formatter.style_state(volume.status().unwrap_or("-")),
        volume
            .size()
            .map(|s| format!("{s} GiB"))
            .unwrap_or_else(|| "-".to_string()),
        volume.availability_zone().unwrap_or("-").to_string(),
        volume.instance_id().unwrap_or("-").to_string(),
        volume.device().unwrap_or("-").to_string(),
        format_time(created),
    ]
}

const VOLUME_HEADERS: &[&str] = &["ID", "STATUS", "SIZE", "ZONE", "INSTANCE", "DEVICE", "CREATED"];

async fn list_volumes(ec2: &Ec2, formatter: &Formatter) -> Result<()> {
    let mut volumes = ec2.volumes();
    let volumes = volumes.all().await.context("Failed to list volumes")?;

    if formatter.is_json() {
        formatter.json(&VolumeListOutput {
            volumes: volumes.iter().map(|v| v.attributes().clone()).collect(),
        });
    } else {
        let rows = volumes.iter().map(|v| volume_row(formatter, v)).collect();
        formatter.table(VOLUME_HEADERS, rows);
    }
    Ok(())
}

async fn create_volume(ec2: &Ec2, args: CreateVolumeArgs, formatter: &Formatter) -> Result<()> {
    if args.size.is_none() && args.snapshot.is_none() {
        return Err(UsageError("Either --size or --snapshot is required".to_string()).into());
    }

    let mut attributes = Attributes::new();
    if let Some(zone) = &args.zone {
        attributes.insert("availability_zone", zone.as_str());
    }
    if let Some(size) = args.size {
        attributes.insert("size", size);
    }
    if let Some(snapshot) = &args.snapshot {
        attributes.insert("snapshot_id", snapshot.as_str());
    }
    let mut volume = ec2.volumes().new_model(attributes);

    if let (Some(instance_id), Some(device)) = (&args.attach, &args.device) {
        let instance = existing_instance(ec2, instance_id).await?;
        if let Some(zone) = &args.zone
            && instance.availability_zone() != Some(zone.as_str())
        {
            formatter.warning(&format!(
                "Ignoring --zone {zone}: the volume is created in the zone of {instance_id}"
            ));
        }
        volume.stage_attachment(&instance, device)?;
    }
    if volume.availability_zone().is_none() {
        return Err(UsageError("--zone is required without --attach".to_string()).into());
    }

    volume.save().await.context("Failed to create volume")?;
    tracing::info!(
        volume_id = ?volume.identity(),
        instance_id = ?volume.instance_id(),
        "Volume created"
    );

    if formatter.is_json() {
        formatter.json(volume.attributes());
    } else {
        formatter.table(VOLUME_HEADERS, vec![volume_row(formatter, &volume)]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use nb_aws::ec2::mock::ZONES;

    use super::*;
    use crate::exit_code::ExitCode;
    use crate::output::OutputConfig;

    fn quiet() -> Formatter {
        Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        })
    }

    fn run_args(count: u32) -> RunArgs {
        RunArgs {
            image_id: "ami-5ee70037".to_string(),
            instance_type: Some("m1.small".to_string()),
            zone: Some(ZONES[2].to_string()),
            key_name: None,
            count,
        }
    }

    #[tokio::test]
    async fn test_run_and_terminate() {
        let ec2 = Ec2::mock();
        run(Ec2Commands::Run(run_args(2)), &ec2, &quiet()).await.unwrap();

        let mut instances = ec2.instances();
        let ids: Vec<String> = instances
            .all()
            .await
            .unwrap()
            .iter()
            .filter_map(|i| i.identity().map(str::to_string))
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(instances[0].availability_zone(), Some(ZONES[2]));

        let terminate = TerminateArgs { ids: ids.clone() };
        run(Ec2Commands::Terminate(terminate), &ec2, &quiet())
            .await
            .unwrap();
        assert!(ec2.instances().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_count_is_usage_error() {
        let ec2 = Ec2::mock();
        let err = run(Ec2Commands::Run(run_args(0)), &ec2, &quiet())
            .await
            .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::UsageError);
    }

    #[tokio::test]
    async fn test_terminate_unknown_instance() {
        let ec2 = Ec2::mock();
        let terminate = TerminateArgs {
            ids: vec!["i-00000000".to_string()],
        };
        let err = run(Ec2Commands::Terminate(terminate), &ec2, &quiet())
            .await
            .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_create_volume_attached_to_instance() {
        let ec2 = Ec2::mock();
        let mut instance = ec2
            .instances()
            .create(
                Attributes::new()
                    .with("image_id", "ami-5ee70037")
                    .with("availability_zone", ZONES[1]),
            )
            .await
            .unwrap();
        instance.reload().await.unwrap();
        let instance_id = instance.identity().unwrap().to_string();

        let args = CreateVolumeArgs {
            zone: None,
            size: Some(10),
            snapshot: None,
            attach: Some(instance_id.clone()),
            device: Some("/dev/sdh".to_string()),
        };
        run(Ec2Commands::CreateVolume(args), &ec2, &quiet())
            .await
            .unwrap();

        let mut volumes = ec2.volumes();
        let volumes = volumes.all().await.unwrap();
        assert_eq!(volumes.len(), 1);
        assert_eq!(volumes[0].availability_zone(), Some(ZONES[1]));
        assert_eq!(volumes[0].instance_id(), Some(instance_id.as_str()));
        assert_eq!(volumes[0].device(), Some("/dev/sdh"));
    }

    #[tokio::test]
    async fn test_create_volume_needs_zone_and_size() {
        let ec2 = Ec2::mock();
        let no_size = CreateVolumeArgs {
            zone: Some(ZONES[0].to_string()),
            size: None,
            snapshot: None,
            attach: None,
            device: None,
        };
        let err = run(Ec2Commands::CreateVolume(no_size), &ec2, &quiet())
            .await
            .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::UsageError);

        let no_zone = CreateVolumeArgs {
            zone: None,
            size: Some(1),
            snapshot: None,
            attach: None,
            device: None,
        };
        let err = run(Ec2Commands::CreateVolume(no_zone), &ec2, &quiet())
            .await
            .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::UsageError);
        assert!(ec2.volumes().all().await.unwrap().is_empty());
    }
}
