//! Profile management commands
//!
//! A profile names a provider account: its credentials plus the region,
//! endpoint and auth URL to reach it.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use nb_core::{Profile, ProfileManager, Provider};

use crate::exit_code::UsageError;
use crate::output::Formatter;

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g. "work", "personal")
    pub name: String,

    /// Provider: aws or rackspace
    pub provider: String,

    /// AWS access key id, or Rackspace username
    pub access_key: String,

    /// AWS secret access key, or Rackspace API key
    pub secret_key: String,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Endpoint override (S3-compatible servers, a fixed storage URL)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Rackspace authentication URL
    #[arg(long)]
    pub auth_url: Option<String>,

    /// Bucket lookup style: auto, path, or dns
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,

    /// Allow insecure TLS connections
    #[arg(long)]
    pub insecure: bool,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region and endpoint
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

/// Profile summary without credentials
#[derive(Debug, Serialize)]
struct ProfileInfo {
    name: String,
    provider: Provider,
    region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    default: bool,
}

#[derive(Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
}

#[derive(Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
}

pub fn run(cmd: ProfileCommands, manager: &ProfileManager, formatter: &Formatter) -> Result<()> {
    match cmd {
        ProfileCommands::Set(args) => set(args, manager, formatter),
        ProfileCommands::List(args) => list(args, manager, formatter),
        ProfileCommands::Remove(args) => remove(args, manager, formatter),
    }
}

fn profile_from_args(args: &SetArgs) -> Result<Profile> {
    if args.name.trim().is_empty() {
        return Err(UsageError("Profile name cannot be empty".to_string()).into());
    }
    let provider: Provider = args
        .provider
        .parse()
        .map_err(|e: nb_core::Error| UsageError(e.to_string()))?;
    if !matches!(args.bucket_lookup.as_str(), "auto" | "path" | "dns") {
        return Err(
            UsageError("Bucket lookup must be 'auto', 'path', or 'dns'".to_string()).into(),
        );
    }

    let mut profile = Profile::new(&args.name, provider, &args.access_key, &args.secret_key);
    profile.region = args.region.clone();
    profile.endpoint = args.endpoint.clone();
    profile.auth_url = args.auth_url.clone();
    profile.bucket_lookup = args.bucket_lookup.clone();
    profile.insecure = args.insecure;
    Ok(profile)
}

fn set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> Result<()> {
    let profile = profile_from_args(&args)?;
    manager.set(profile)?;
    if args.default {
        manager.set_default(&args.name)?;
    }
    tracing::info!(profile = %args.name, "Profile saved");

    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: args.name,
        });
    } else {
        let name = formatter.style_name(&args.name);
        formatter.success(&format!("Profile '{name}' configured."));
    }
    Ok(())
}

fn list(args: ListArgs, manager: &ProfileManager, formatter: &Formatter) -> Result<()> {
    let profiles = manager.list()?;
    let default = manager.default_profile()?;
    let infos: Vec<ProfileInfo> = profiles
        .into_iter()
        .map(|p| ProfileInfo {
            default: default.as_deref() == Some(p.name.as_str()),
            name: p.name,
            provider: p.provider,
            region: p.region,
            endpoint: p.endpoint,
        })
        .collect();

    if formatter.is_json() {
        formatter.json(&ProfileListOutput { profiles: infos });
        return Ok(());
    }
    if infos.is_empty() {
        formatter.println("No profiles configured.");
        return Ok(());
    }

    let mut headers = vec!["NAME", "PROVIDER"];
    if args.long {
        headers.extend(["REGION", "ENDPOINT"]);
    }
    let rows = infos
        .into_iter()
        .map(|info| {
            let marker = if info.default { " *" } else { "" };
            let mut row = vec![format!("{}{marker}", info.name), info.provider.to_string()];
            if args.long {
                row.push(info.region);
                row.push(info.endpoint.unwrap_or_else(|| "-".to_string()));
            }
            row
        })
        .collect();
    formatter.table(&headers, rows);
    Ok(())
}

fn remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> Result<()> {
    manager.remove(&args.name)?;
    tracing::info!(profile = %args.name, "Profile removed");

    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: args.name,
        });
    } else {
        let name = formatter.style_name(&args.name);
        formatter.success(&format!("Profile '{name}' removed."));
    }
    Ok(())
}
