//! Rackspace Cloud Files commands

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use serde::Serialize;

use nb_core::{Attributes, Model};
use nb_rackspace::{Container, Files};

use crate::output::{Formatter, format_size, format_time};

#[derive(Subcommand, Debug)]
pub enum FilesCommands {
    /// List containers, or the objects in a container
    Ls(LsArgs),

    /// Create a container
    Mkdir(ContainerArgs),

    /// Remove an empty container
    Rmdir(ContainerArgs),

    /// Upload a local file as an object
    Put(PutArgs),

    /// Remove an object
    Rm(ObjectArgs),
}

#[derive(clap::Args, Debug)]
pub struct LsArgs {
    /// Container to list; all containers when omitted
    pub container: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ContainerArgs {
    pub container: String,
}

#[derive(clap::Args, Debug)]
pub struct PutArgs {
    pub container: String,
    pub object: String,
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct ObjectArgs {
    pub container: String,
    pub object: String,
}

#[derive(Serialize)]
struct ContainerListOutput {
    containers: Vec<Attributes>,
}

#[derive(Serialize)]
struct ObjectListOutput {
    container: String,
    objects: Vec<Attributes>,
}

pub async fn run(cmd: FilesCommands, files: &Files, formatter: &Formatter) -> Result<()> {
    match cmd {
        FilesCommands::Ls(args) => match args.container {
            Some(container) => list_objects(files, &container, formatter).await,
            None => list_containers(files, formatter).await,
        },
        FilesCommands::Mkdir(args) => make_container(files, &args.container, formatter).await,
        FilesCommands::Rmdir(args) => remove_container(files, &args.container, formatter).await,
        FilesCommands::Put(args) => put(files, args, formatter).await,
        FilesCommands::Rm(args) => remove_object(files, &args.container, &args.object, formatter).await,
    }
}

async fn existing_container(files: &Files, name: &str) -> Result<Container> {
    files
        .containers()
        .get(name)
        .await?
        .ok_or_else(|| nb_core::Error::NotFound(format!("Container '{name}'")).into())
}

async fn list_containers(files: &Files, formatter: &Formatter) -> Result<()> {
    let mut containers = files.containers();
    let containers = containers.all().await.context("Failed to list containers")?;

    if formatter.is_json() {
        formatter.json(&ContainerListOutput {
            containers: containers.iter().map(|c| c.attributes().clone()).collect(),
        });
        return Ok(());
    }
    let rows = containers
        .iter()
        .map(|container| {
            vec![
                formatter.style_name(container.name().unwrap_or_default()),
                container.count().unwrap_or(0).to_string(),
                format_size(container.bytes().unwrap_or(0)),
            ]
        })
        .collect();
    formatter.table(&["NAME", "OBJECTS", "SIZE"], rows);
    Ok(())
}

async fn list_objects(files: &Files, container: &str, formatter: &Formatter) -> Result<()> {
    let container = existing_container(files, container).await?;
    let name = container.name().unwrap_or_default().to_string();
    let mut objects = container.objects();
    let objects = objects
        .all()
        .await
        .with_context(|| format!("Failed to list container '{name}'"))?;

    if formatter.is_json() {
        formatter.json(&ObjectListOutput {
            container: name,
            objects: objects.iter().map(|o| o.attributes().clone()).collect(),
        });
        return Ok(());
    }
    let rows = objects
        .iter()
        .map(|object| {
            vec![
                format_time(object.attributes().get_timestamp("last_modified")),
                format_size(object.bytes().unwrap_or(0)),
                object.content_type().unwrap_or("-").to_string(),
                formatter.style_key(object.name().unwrap_or_default()),
            ]
        })
        .collect();
    formatter.table(&["MODIFIED", "SIZE", "TYPE", "NAME"], rows);
    Ok(())
}

async fn make_container(files: &Files, name: &str, formatter: &Formatter) -> Result<()> {
    let container = files
        .containers()
        .create(Attributes::new().with("name", name))
        .await
        .with_context(|| format!("Failed to create container '{name}'"))?;
    tracing::info!(container = %name, "Container created");

    if formatter.is_json() {
        formatter.json(container.attributes());
    } else {
        let name = formatter.style_name(name);
        formatter.success(&format!("Container '{name}' created."));
    }
    Ok(())
}

async fn remove_container(files: &Files, name: &str, formatter: &Formatter) -> Result<()> {
    let mut container = existing_container(files, name).await?;
    container
        .destroy()
        .await
        .with_context(|| format!("Failed to remove container '{name}'"))?;
    tracing::info!(container = %name, "Container removed");

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "removed": name }));
    } else {
        let name = formatter.style_name(name);
        formatter.success(&format!("Container '{name}' removed."));
    }
    Ok(())
}

async fn put(files: &Files, args: PutArgs, formatter: &Formatter) -> Result<()> {
    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let content_type = mime_guess::from_path(&args.file)
        .first_or_octet_stream()
        .to_string();

    let mut object = files.container(&args.container).objects().new_model(
        Attributes::new()
            .with("name", args.object.as_str())
            .with("content_type", content_type.as_str()),
    );
    object.set_body(data);
    object
        .save()
        .await
        .with_context(|| format!("Failed to upload {}/{}", args.container, args.object))?;
    tracing::info!(container = %args.container, object = %args.object, "Object uploaded");

    if formatter.is_json() {
        formatter.json(object.attributes());
    } else {
        let size = format_size(object.bytes().unwrap_or(0));
        let name = formatter.style_key(&args.object);
        formatter.success(&format!("Uploaded '{name}' ({size})."));
    }
    Ok(())
}

async fn remove_object(
    files: &Files,
    container: &str,
    name: &str,
    formatter: &Formatter,
) -> Result<()> {
    let mut object = files
        .container(container)
        .objects()
        .get(name)
        .await?
        .ok_or_else(|| nb_core::Error::NotFound(format!("Object '{container}/{name}'")))?;
    object.destroy().await?;
    tracing::info!(container = %container, object = %name, "Object removed");

    if formatter.is_json() {
        formatter.json(&serde_json::json!({ "removed": format!("{container}/{name}") }));
    } else {
        let name = formatter.style_key(name);
        formatter.success(&format!("Removed '{name}'."));
    }
    Ok(())
}
