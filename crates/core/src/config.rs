//! Configuration management
//!
//! Profiles and defaults are stored in a TOML file. The location is
//! `$NB_CONFIG_DIR/config.toml` when the variable is set, otherwise
//! `<platform config dir>/nimbus/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration file version
const CONFIG_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "NB_CONFIG_DIR";

/// Cloud provider a profile connects to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Aws,
    Rackspace,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Aws => f.write_str("aws"),
            Provider::Rackspace => f.write_str("rackspace"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "rackspace" => Ok(Provider::Rackspace),
            other => Err(Error::Config(format!(
                "Unknown provider '{other}' (expected 'aws' or 'rackspace')"
            ))),
        }
    }
}

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

/// Named set of credentials and connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub provider: Provider,
    /// AWS access key id, or Rackspace username
    pub access_key: String,
    /// AWS secret access key, or Rackspace API key
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint override (S3-compatible servers, EC2 mirrors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Rackspace authentication URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    /// Bucket lookup style: auto, path or dns
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        provider: Provider,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            endpoint: None,
            auth_url: None,
            bucket_lookup: default_bucket_lookup(),
            insecure: false,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry: None,
        }
    }

    /// Retry policy, falling back to the defaults
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

/// Global defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// Profile used when `--profile` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Default output format: human or json
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_output() -> String {
    "human".to_string()
}

fn default_color() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            profile: None,
            output: default_output(),
            color: default_color(),
        }
    }
}

/// On-disk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            defaults: Defaults::default(),
            profiles: Vec::new(),
        }
    }
}

/// Loads and saves the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default configuration location
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?
                .join("nimbus"),
        };
        Ok(Self::with_path(dir.join("config.toml")))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration; a missing file yields the defaults
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config: Config = toml::from_str(&content)?;

        if config.version > CONFIG_VERSION {
            return Err(Error::Config(format!(
                "Config version {} is newer than supported version {CONFIG_VERSION}",
                config.version
            )));
        }
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.path, content)?;
        tracing::debug!(path = %self.path.display(), "Config saved");
        Ok(())
    }
}

/// CRUD over the profiles stored in the configuration file
#[derive(Debug, Clone)]
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    pub fn list(&self) -> Result<Vec<Profile>> {
        Ok(self.config_manager.load()?.profiles)
    }

    pub fn get(&self, name: &str) -> Result<Profile> {
        self.config_manager
            .load()?
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// The profile named, or the configured default profile
    pub fn resolve(&self, name: Option<&str>) -> Result<Profile> {
        match name {
            Some(name) => self.get(name),
            None => {
                let config = self.config_manager.load()?;
                let name = config.defaults.profile.ok_or_else(|| {
                    Error::Config("No profile given and no default profile configured".to_string())
                })?;
                self.get(&name)
            }
        }
    }

    /// Add or replace a profile
    pub fn set(&self, profile: Profile) -> Result<()> {
        let mut config = self.config_manager.load()?;
        match config.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => config.profiles.push(profile),
        }
        self.config_manager.save(&config)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let before = config.profiles.len();
        config.profiles.retain(|p| p.name != name);
        if config.profiles.len() == before {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        if config.defaults.profile.as_deref() == Some(name) {
            config.defaults.profile = None;
        }
        self.config_manager.save(&config)
    }

    /// Name of the configured default profile, if any
    pub fn default_profile(&self) -> Result<Option<String>> {
        Ok(self.config_manager.load()?.defaults.profile)
    }

    /// Make a profile the default
    pub fn set_default(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        if !config.profiles.iter().any(|p| p.name == name) {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        config.defaults.profile = Some(name.to_string());
        self.config_manager.save(&config)
    }
}
