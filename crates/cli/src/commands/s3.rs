//! S3 bucket and object commands

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use serde::Serialize;

use nb_aws::{Bucket, Object, S3};
use nb_core::{Attributes, Model};

use crate::exit_code::UsageError;
use crate::output::{Formatter, format_size, format_time};

#[derive(Subcommand, Debug)]
pub enum S3Commands {
    /// List buckets, or the objects in a bucket
    Ls(LsArgs),

    /// Make a bucket
    Mb(MbArgs),

    /// Remove an empty bucket
    Rb(BucketArgs),

    /// Show or change who pays for requests to a bucket
    Payer(PayerArgs),

    /// Upload a local file as an object
    Put(PutArgs),

    /// Write an object's content to stdout
    Cat(ObjectArgs),

    /// Remove an object
    Rm(ObjectArgs),
}

#[derive(clap::Args, Debug)]
pub struct LsArgs {
    /// Bucket to list; all buckets when omitted
    pub bucket: Option<String>,

    /// Only list keys starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct MbArgs {
    pub bucket: String,

    /// Location constraint, e.g. EU
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct BucketArgs {
    pub bucket: String,
}

#[derive(clap::Args, Debug)]
pub struct PayerArgs {
    pub bucket: String,

    /// New payer: BucketOwner or Requester
    pub value: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PutArgs {
    pub bucket: String,
    pub key: String,
    pub file: PathBuf,

    /// Content type; guessed from the file name when omitted
    #[arg(long)]
    pub content_type: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ObjectArgs {
    pub bucket: String,
    pub key: String,
}

#[derive(Serialize)]
struct BucketListOutput {
    buckets: Vec<Attributes>,
}

#[derive(Serialize)]
struct ObjectListOutput {
    bucket: String,
    objects: Vec<Attributes>,
}

#[derive(Serialize)]
struct PayerOutput {
    bucket: String,
    payer: String,
}

pub async fn run(cmd: S3Commands, s3: &S3, formatter: &Formatter) -> Result<()> {
    match cmd {
        S3Commands::Ls(args) => match args.bucket {
            Some(bucket) => list_objects(s3, &bucket, args.prefix.as_deref(), formatter).await,
            None => list_buckets(s3, formatter).await,
        },
        S3Commands::Mb(args) => make_bucket(s3, args, formatter).await,
        S3Commands::Rb(args) => remove_bucket(s3, &args.bucket, formatter).await,
        S3Commands::Payer(args) => payer(s3, args, formatter).await,
        S3Commands::Put(args) => put(s3, args, formatter).await,
        S3Commands::Cat(args) => cat(s3, &args.bucket, &args.key).await,
        S3Commands::Rm(args) => remove_object(s3, &args.bucket, &args.key, formatter).await,
    }
}

async fn existing_bucket(s3: &S3, name: &str) -> Result<Bucket> {
    s3.buckets()
        .get(name)
        .await?
        .ok_or_else(|| nb_core::Error::NotFound(format!("Bucket '{name}'")).into())
}

async fn existing_object(s3: &S3, bucket: &str, key: &str) -> Result<Object> {
    s3.bucket(bucket)
        .objects()
        .get(key)
        .await?
        .ok_or_else(|| nb_core::Error::NotFound(format!("Object '{bucket}/{key}'")).into())
}

async fn list_buckets(s3: &S3, formatter: &Formatter) -> Result<()> {
    let mut buckets = s3.buckets();
    let buckets = buckets.all().await.context("Failed to list buckets")?;

    if formatter.is_json() {
        formatter.json(&BucketListOutput {
            buckets: buckets.iter().map(|b| b.attributes().clone()).collect(),
        });
        return Ok(());
    }
    let rows = buckets
        .iter()
        .map(|bucket| {
            vec![
                format_time(bucket.creation_date()),
                formatter.style_name(bucket.name().unwrap_or_default()),
            ]
        })
        .collect();
    formatter.table(&["CREATED", "NAME"], rows);
    Ok(())
}

async fn list_objects(
    s3: &S3,
    bucket: &str,
    prefix: Option<&str>,
    formatter: &Formatter,
) -> Result<()> {
    let bucket_ref = s3.bucket(bucket);
    let mut objects = match prefix {
        Some(prefix) => bucket_ref.objects_with_prefix(prefix),
        None => bucket_ref.objects(),
    };
    let matching = objects
        .all()
        .await
        .with_context(|| format!("Failed to list bucket '{bucket}'"))?;

    if formatter.is_json() {
        formatter.json(&ObjectListOutput {
            bucket: bucket.to_string(),
            objects: matching.iter().map(|o| o.attributes().clone()).collect(),
        });
        return Ok(());
    }
    let rows = matching
        .iter()
        .map(|object| {
            vec![
                format_time(object.attributes().get_timestamp("last_modified")),
                format_size(object.size().unwrap_or(0)),
                formatter.style_key(object.key().unwrap_or_default()),
            ]
        })
        .collect();
    formatter.table(&["MODIFIED", "SIZE", "KEY"], rows);
    Ok(())
}

async fn make_bucket(s3: &S3, args: MbArgs, formatter: &Formatter) -> Result<()> {
    let mut attributes = Attributes::new().with("name", args.bucket.as_str());
    if let Some(location) = &args.location {
        attributes.insert("location", location.as_str());
    }
    let bucket = s3
        .buckets()
        .create(attributes)
        .await
        .with_context(|| format!("Failed to create bucket '{}'", args.bucket))?;
    tracing::info!(bucket = %args.bucket, "Bucket created");

    if formatter.is_json() {
        formatter.json(bucket.attributes());
    } else {
        let name = formatter.style_name(&args.bucket);
        formatter.success(&format!("Bucket '{name}' created."));
    }
    Ok(())
}

async fn remove_bucket(s3: &S3, name: &str, formatter: &Formatter) -> Result<()> {
    let mut bucket = existing_bucket(s3, name).await?;
    bucket
        .destroy()
        .await
        .with_context(|| format!("Failed to remove bucket '{name}'"))?;
    tracing::info!(bucket = %name, "Bucket removed");

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "removed": name }));
    } else {
        let name = formatter.style_name(name);
        formatter.success(&format!("Bucket '{name}' removed."));
    }
    Ok(())
}

async fn payer(s3: &S3, args: PayerArgs, formatter: &Formatter) -> Result<()> {
    let mut bucket = existing_bucket(s3, &args.bucket).await?;
    let payer = match args.value {
        Some(value) => {
            if !matches!(value.as_str(), "BucketOwner" | "Requester") {
                return Err(
                    UsageError("Payer must be 'BucketOwner' or 'Requester'".to_string()).into(),
                );
            }
            bucket.set_payer(&value).await?;
            tracing::info!(bucket = %args.bucket, payer = %value, "Request payer changed");
            value
        }
        None => bucket.payer().await?,
    };

    if formatter.is_json() {
        formatter.json(&PayerOutput {
            bucket: args.bucket,
            payer,
        });
    } else {
        formatter.println(&format!("{}: {payer}", formatter.style_name(&args.bucket)));
    }
    Ok(())
}

async fn put(s3: &S3, args: PutArgs, formatter: &Formatter) -> Result<()> {
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let content_type = args.content_type.unwrap_or_else(|| {
        mime_guess::from_path(&args.file)
            .first_or_octet_stream()
            .to_string()
    });

    let mut object = s3.bucket(&args.bucket).objects().new_model(
        Attributes::new()
            .with("key", args.key.as_str())
            .with("content_type", content_type.as_str()),
    );
    object.set_body(data);
    object
        .save()
        .await
        .with_context(|| format!("Failed to upload {}/{}", args.bucket, args.key))?;
    tracing::info!(bucket = %args.bucket, key = %args.key, size = ?object.size(), "Object uploaded");

    if formatter.is_json() {
        formatter.json(object.attributes());
    } else {
        let size = format_size(object.size().unwrap_or(0));
        let key = formatter.style_key(&args.key);
        formatter.success(&format!("Uploaded '{key}' ({size})."));
    }
    Ok(())
}

async fn cat(s3: &S3, bucket: &str, key: &str) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut object = existing_object(s3, bucket, key).await?;
    let body = object.load_body().await?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(body).await?;
    stdout.flush().await?;
    Ok(())
}

async fn remove_object(s3: &S3, bucket: &str, key: &str, formatter: &Formatter) -> Result<()> {
    let mut object = existing_object(s3, bucket, key).await?;
    object.destroy().await?;
    tracing::info!(bucket = %bucket, key = %key, "Object removed");

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "removed": format!("{bucket}/{key}") }));
    } else {
        let key = formatter.style_key(key);
        formatter.success(&format!("Removed '{key}'."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_code::ExitCode;
    use crate::output::OutputConfig;

    fn quiet() -> Formatter {
        Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_make_upload_and_remove() {
        let s3 = S3::mock();
        let formatter = quiet();
        let mb = MbArgs {
            bucket: "uploads".to_string(),
            location: None,
        };
        run(S3Commands::Mb(mb), &s3, &formatter).await.unwrap();

        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        std::fs::write(file.path(), br#"{"a":1}"#).unwrap();
        let put = PutArgs {
            bucket: "uploads".to_string(),
            key: "data/a.json".to_string(),
            file: file.path().to_path_buf(),
            content_type: None,
        };
        run(S3Commands::Put(put), &s3, &formatter).await.unwrap();

        let object = existing_object(&s3, "uploads", "data/a.json").await.unwrap();
        assert_eq!(object.size(), Some(7));
        assert_eq!(
            object.attributes().get_str("content_type"),
            Some("application/json")
        );

        let rm = ObjectArgs {
            bucket: "uploads".to_string(),
            key: "data/a.json".to_string(),
        };
        run(S3Commands::Rm(rm), &s3, &formatter).await.unwrap();
        let rb = BucketArgs {
            bucket: "uploads".to_string(),
        };
        run(S3Commands::Rb(rb), &s3, &formatter).await.unwrap();
        assert!(s3.buckets().get("uploads").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_bucket_is_not_found() {
        let s3 = S3::mock();
        let rb = BucketArgs {
            bucket: "nope".to_string(),
        };
        let err = run(S3Commands::Rb(rb), &s3, &quiet()).await.unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
    }

    #[tokio::test]
    async fn test_remove_non_empty_bucket_is_conflict() {
        let s3 = S3::mock();
        s3.put_bucket("full", None).await.unwrap();
        s3.put_object("full", "k", "v", None).await.unwrap();
        let rb = BucketArgs {
            bucket: "full".to_string(),
        };
        let err = run(S3Commands::Rb(rb), &s3, &quiet()).await.unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::Conflict);
    }

    #[tokio::test]
    async fn test_payer_validation_and_update() {
        let s3 = S3::mock();
        s3.put_bucket("paid", None).await.unwrap();

        let bad = PayerArgs {
            bucket: "paid".to_string(),
            value: Some("Nobody".to_string()),
        };
        let err = run(S3Commands::Payer(bad), &s3, &quiet()).await.unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::UsageError);

        let good = PayerArgs {
            bucket: "paid".to_string(),
            value: Some("Requester".to_string()),
        };
        run(S3Commands::Payer(good), &s3, &quiet()).await.unwrap();
        let mut bucket = existing_bucket(&s3, "paid").await.unwrap();
        assert_eq!(bucket.payer().await.unwrap(), "Requester");
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let s3 = S3::mock();
        s3.put_bucket("logs", None).await.unwrap();
        for key in ["2009/a", "2009/b", "2010/a"] {
            s3.put_object("logs", key, "x", None).await.unwrap();
        }
        let ls = LsArgs {
            bucket: Some("logs".to_string()),
            prefix: Some("2009/".to_string()),
        };
        run(S3Commands::Ls(ls), &s3, &quiet()).await.unwrap();

        let missing = LsArgs {
            bucket: Some("absent".to_string()),
            prefix: None,
        };
        let err = run(S3Commands::Ls(missing), &s3, &quiet()).await.unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
    }
}
