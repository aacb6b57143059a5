//! End-to-end flows against the in-memory AWS backends

use nb_aws::ec2::mock::ZONES;
use nb_aws::{Ec2, Instance, RunInstancesOptions, S3, Volume};
use nb_core::{Attributes, Model, Value};

#[tokio::test]
async fn test_bucket_create_get_destroy() {
    let s3 = S3::mock();
    let mut buckets = s3.buckets();

    let mut bucket = buckets
        .create(Attributes::new().with("name", "fogbucketname"))
        .await
        .unwrap();
    let fetched = buckets.get("fogbucketname").await.unwrap().unwrap();
    assert_eq!(fetched.attributes(), bucket.attributes());

    assert!(bucket.destroy().await.unwrap());
    assert!(buckets.get("fogbucketname").await.unwrap().is_none());
}

#[tokio::test]
async fn test_run_instances_envelope() {
    let ec2 = Ec2::mock();
    let body = ec2
        .run_instances("ami-5ee70037", 1, 1, &RunInstancesOptions::default())
        .await
        .unwrap()
        .body;

    let instances = body.get_list("instancesSet").unwrap();
    assert_eq!(instances.len(), 1);
    let instance = instances[0].as_map().unwrap();
    assert!(instance.get_map("instanceState").is_some());

    let reservation_id = body.get_str("reservationId").unwrap();
    let described = ec2
        .describe_instances(&[instance.get_str("instanceId").unwrap()])
        .await
        .unwrap()
        .body;
    let reservation = described.get_list("reservationSet").unwrap()[0]
        .as_map()
        .unwrap();
    assert_eq!(reservation.get_str("reservationId"), Some(reservation_id));
}

#[tokio::test]
async fn test_collection_properties_for_every_model() {
    let s3 = S3::mock();
    let mut buckets = s3.buckets();
    assert!(buckets.get("never-created").await.unwrap().is_none());
    let mut bucket = buckets
        .create(Attributes::new().with("name", "listed"))
        .await
        .unwrap();
    assert!(buckets.all().await.unwrap().iter().any(|b| b.name() == Some("listed")));
    bucket.destroy().await.unwrap();
    assert!(buckets.all().await.unwrap().is_empty());

    let ec2 = Ec2::mock();
    let mut volumes = ec2.volumes();
    assert!(volumes.get("vol-ffffffff").await.unwrap().is_none());
    let mut volume = volumes
        .create(
            Attributes::new()
                .with("availability_zone", ZONES[0])
                .with("size", 5),
        )
        .await
        .unwrap();
    let id = volume.identity().unwrap().to_string();
    volumes.reload().await.unwrap();
    assert!(volumes.ids().contains(&id.as_str()));
    volume.destroy().await.unwrap();
    volumes.reload().await.unwrap();
    assert!(!volumes.ids().contains(&id.as_str()));
}

#[tokio::test]
async fn test_object_upload_and_listing() {
    let s3 = S3::mock();
    let bucket = s3
        .buckets()
        .create(Attributes::new().with("name", "uploads"))
        .await
        .unwrap();

    let mut objects = bucket.objects();
    let mut object = objects.new_model(Attributes::new().with("key", "a/b.txt"));
    object.set_body("payload");
    object.save().await.unwrap();

    objects.reload().await.unwrap();
    assert_eq!(objects.ids(), vec!["a/b.txt"]);
    assert_eq!(objects[0].size(), Some(7));
    assert!(matches!(objects[0].get("last_modified"), Some(Value::Timestamp(_))));
}

#[tokio::test]
async fn test_volume_staged_attachment() {
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
    assert!(instance.is_ready());

    let mut volume = Volume::build(ec2.clone(), Attributes::new().with("size", 1));
    volume.stage_attachment(&instance, "/dev/sdh").unwrap();
    volume.save().await.unwrap();

    let mut attached = ec2
        .volumes()
        .get(volume.identity().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attached.availability_zone(), Some(ZONES[1]));
    assert_eq!(attached.instance_id(), instance.identity());

    attached.detach().await.unwrap();
    assert!(attached.instance_id().is_none());

    let instance_id = instance.identity().unwrap().to_string();
    instance.destroy().await.unwrap();
    let terminated: Instance = ec2.instances().get(&instance_id).await.unwrap().unwrap();
    assert_ne!(terminated.state(), Some("running"));
}
