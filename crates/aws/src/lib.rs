//! AWS adapter for nimbus
//!
//! [`Ec2`] and [`S3`] are cloneable connection handles holding the backend
//! every request goes through: a SigV4-signed remote backend from
//! [`Ec2::connect`]/[`S3::connect`], or an in-memory mock from `mock()`.
//!
//! ```no_run
//! # async fn demo() -> nb_core::Result<()> {
//! use nb_aws::S3;
//! use nb_core::Attributes;
//!
//! let s3 = S3::mock();
//! let mut buckets = s3.buckets();
//! let bucket = buckets.create(Attributes::new().with("name", "logs")).await?;
//! assert_eq!(bucket.name(), Some("logs"));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod ec2;
pub mod s3;
pub mod signer;
pub mod xml;

pub use ec2::{Ec2, Instance, RunInstancesOptions, Snapshot, Volume};
pub use s3::{Bucket, BucketRef, ListOptions, Object, S3};
pub use signer::SigV4Signer;
