//! Command definitions and dispatch
//!
//! Provider commands run against a connection built from the selected
//! profile, or against a fresh in-memory backend with `--mock`. A mock
//! backend lives only for the one invocation.

pub mod ec2;
pub mod files;
pub mod profile;
pub mod s3;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

use nb_aws::{Ec2, S3};
use nb_core::{Profile, ProfileManager, Provider};
use nb_rackspace::Files;

use crate::exit_code::{ExitCode, UsageError};
use crate::output::{Formatter, OutputConfig};

#[derive(Parser, Debug)]
#[command(name = "nb", version, about = "Cloud API client for AWS EC2/S3 and Rackspace Cloud Files")]
pub struct Cli {
    /// Profile to connect with (default: the configured default profile)
    #[arg(long, short = 'p', global = true, env = "NB_PROFILE")]
    pub profile: Option<String>,

    /// Answer from an in-memory backend instead of the provider
    #[arg(long, global = true)]
    pub mock: bool,

    /// Print one JSON document instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only print errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log at debug level
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage connection profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// Amazon S3 buckets and objects
    #[command(subcommand)]
    S3(s3::S3Commands),

    /// Amazon EC2 instances and volumes
    #[command(subcommand)]
    Ec2(ec2::Ec2Commands),

    /// Rackspace Cloud Files containers and objects
    #[command(subcommand)]
    Files(files::FilesCommands),
}

/// Connection settings shared by provider commands
#[derive(Debug, Clone)]
pub struct Context {
    pub profile: Option<String>,
    pub mock: bool,
}

impl Context {
    fn resolve_profile(&self, provider: Provider) -> Result<Profile> {
        let profile = ProfileManager::new()?
            .resolve(self.profile.as_deref())
            .context("Cannot select a profile")?;
        if profile.provider != provider {
            return Err(UsageError(format!(
                "Profile '{}' is for {}, this command needs {provider}",
                profile.name, profile.provider
            ))
            .into());
        }
        Ok(profile)
    }

    pub fn s3(&self) -> Result<S3> {
        if self.mock {
            return Ok(S3::mock());
        }
        let profile = self.resolve_profile(Provider::Aws)?;
        Ok(S3::connect(&profile)?)
    }

    pub fn ec2(&self) -> Result<Ec2> {
        if self.mock {
            return Ok(Ec2::mock());
        }
        let profile = self.resolve_profile(Provider::Aws)?;
        Ok(Ec2::connect(&profile)?)
    }

    pub async fn files(&self) -> Result<Files> {
        if self.mock {
            return Ok(Files::mock());
        }
        let profile = self.resolve_profile(Provider::Rackspace)?;
        Files::connect(&profile)
            .await
            .context("Failed to authenticate with Rackspace")
    }
}

/// Run the parsed command and report failures through the formatter
pub async fn execute(cli: Cli) -> ExitCode {
    let formatter = Formatter::new(OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    });
    let context = Context {
        profile: cli.profile,
        mock: cli.mock,
    };

    let result = match cli.command {
        Commands::Profile(cmd) => match ProfileManager::new() {
            Ok(manager) => profile::run(cmd, &manager, &formatter),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to load configuration")),
        },
        Commands::S3(cmd) => match context.s3() {
            Ok(s3) => s3::run(cmd, &s3, &formatter).await,
            Err(e) => Err(e),
        },
        Commands::Ec2(cmd) => match context.ec2() {
            Ok(ec2) => ec2::run(cmd, &ec2, &formatter).await,
            Err(e) => Err(e),
        },
        Commands::Files(cmd) => match context.files().await {
            Ok(files) => files::run(cmd, &files, &formatter).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            formatter.error(&format!("{err:#}"));
            ExitCode::from_error(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["nb", "s3", "ls", "--mock", "--json", "-vv"]).unwrap();
        assert!(cli.mock);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::S3(s3::S3Commands::Ls(_))));
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["nb"]).is_err());
        assert!(Cli::try_parse_from(["nb", "s3"]).is_err());
    }

    #[tokio::test]
    async fn test_mock_context_skips_profiles() {
        let context = Context {
            profile: Some("does-not-exist".to_string()),
            mock: true,
        };
        let s3 = context.s3().unwrap();
        assert!(s3.buckets().all().await.unwrap().is_empty());
        assert!(context.ec2().is_ok());
        assert!(context.files().await.is_ok());
    }
}
