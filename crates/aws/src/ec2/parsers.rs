//! EC2 response parsers
//!
//! Every EC2 response is an XML document whose `*Set` elements wrap `<item>`
//! lists. One [`Shape`] describes them; the per-request parsers add the list
//! keys a response carries even when the provider omits them.

use nb_core::{Attributes, FieldType, RawResponse, Result};

use crate::xml::{Element, Shape, with_lists};

fn is_list(name: &str) -> bool {
    name.ends_with("Set")
        || matches!(
            name,
            "productCodes" | "availabilityZoneInfo" | "blockDeviceMapping"
        )
}

fn type_of(name: &str) -> Option<FieldType> {
    match name {
        "amiLaunchIndex" | "code" | "size" => Some(FieldType::Integer),
        "launchTime" | "createTime" | "attachTime" | "startTime" => Some(FieldType::Timestamp),
        // `state` only appears under `monitoring`
        "state" | "return" => Some(FieldType::Boolean),
        _ => None,
    }
}

pub static EC2: Shape = Shape {
    is_list,
    repeated: &[],
    type_of,
};

fn document(raw: &RawResponse) -> Result<Attributes> {
    let root = Element::parse(&raw.body_text())?;
    Ok(EC2.attributes(&root))
}

pub fn run_instances(raw: &RawResponse) -> Result<Attributes> {
    document(raw).map(|a| with_lists(a, &["groupSet", "instancesSet"]))
}

pub fn describe_instances(raw: &RawResponse) -> Result<Attributes> {
    document(raw).map(|a| with_lists(a, &["reservationSet"]))
}

pub fn terminate_instances(raw: &RawResponse) -> Result<Attributes> {
    document(raw).map(|a| with_lists(a, &["instancesSet"]))
}

pub fn create_volume(raw: &RawResponse) -> Result<Attributes> {
    document(raw)
}

pub fn describe_volumes(raw: &RawResponse) -> Result<Attributes> {
    document(raw).map(|a| with_lists(a, &["volumeSet"]))
}

pub fn delete_volume(raw: &RawResponse) -> Result<Attributes> {
    document(raw)
}

pub fn attach_volume(raw: &RawResponse) -> Result<Attributes> {
    document(raw)
}

pub fn detach_volume(raw: &RawResponse) -> Result<Attributes> {
    document(raw)
}

pub fn create_snapshot(raw: &RawResponse) -> Result<Attributes> {
    document(raw)
}

pub fn describe_snapshots(raw: &RawResponse) -> Result<Attributes> {
    document(raw).map(|a| with_lists(a, &["snapshotSet"]))
}

pub fn delete_snapshot(raw: &RawResponse) -> Result<Attributes> {
    document(raw)
}

pub fn describe_availability_zones(raw: &RawResponse) -> Result<Attributes> {
    document(raw).map(|a| with_lists(a, &["availabilityZoneInfo"]))
}
