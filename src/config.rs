//! Configuration Management
//!
//! One YAML file configures both the agent and the hub. Everything except the
//! instance spec has a default, so a hub can run from an almost empty file.

use crate::cf::matcher::DEFAULT_DEPLOYMENT_PREFIX;
use crate::cf::resolver::DEFAULT_APP_LOOKUP_CONCURRENCY;
use crate::cf::{CfClient, ClientCredentials, DeploymentResolver, ResolverOptions, SpaceSource};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// File name of the hub's SQLite database inside the data directory
pub const DB_FILE_NAME: &str = "bdd-hub.db";

/// BOSH instance identity, as rendered into the job's config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSpec {
    pub id: String,
    pub instance_name: String,
    pub address: String,
    pub az: String,
    pub deployment: String,
    pub index: i64,
    pub ip: String,
}

/// Client-credentials section of the `cf` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentialsConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Cloud Foundry enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfConfig {
    /// Cloud Controller base URL, e.g. `https://api.sys.example.com`
    pub api_url: String,
    #[serde(default = "default_deployment_prefix")]
    pub deployment_prefix: String,
    #[serde(default)]
    pub space_source: SpaceSource,
    #[serde(default = "default_app_lookup_concurrency")]
    pub app_lookup_concurrency: usize,
    #[serde(default)]
    pub client_credentials: Option<ClientCredentialsConfig>,
}

impl CfConfig {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            deployment_prefix: self.deployment_prefix.clone(),
            space_source: self.space_source,
            app_lookup_concurrency: self.app_lookup_concurrency,
        }
    }

    /// Build a resolver wired to the configured Cloud Controller
    pub fn build_resolver(&self) -> Result<DeploymentResolver> {
        let credentials = self
            .client_credentials
            .as_ref()
            .map(|creds| ClientCredentials {
                token_url: creds.token_url.clone(),
                client_id: creds.client_id.clone(),
                client_secret: creds.client_secret.clone(),
            });

        let client = CfClient::new(&self.api_url, credentials)?;
        DeploymentResolver::new(client, self.resolver_options())
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .with_context(|| format!("Invalid cf.api_url: {}", self.api_url))?;

        if let Some(creds) = &self.client_credentials {
            Url::parse(&creds.token_url).with_context(|| {
                format!("Invalid cf.client_credentials.token_url: {}", creds.token_url)
            })?;
        }

        if self.deployment_prefix.is_empty() {
            anyhow::bail!("cf.deployment_prefix must not be empty");
        }

        Ok(())
    }
}

/// Agent and hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spec: InstanceSpec,
    /// Address the hub listens on and the agent submits to
    #[serde(default = "default_hub_addr")]
    pub hub_addr: String,
    /// Directory holding the hub database
    #[serde(default)]
    pub hub_data_dir: Option<PathBuf>,
    /// Free-form deployment type label, stored with every row
    #[serde(default)]
    pub label: String,
    /// Seconds between agent submissions
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_persistent_disk_path")]
    pub persistent_disk_path: PathBuf,
    /// Enables Cloud Foundry enrichment when present
    #[serde(default)]
    pub cf: Option<CfConfig>,
}

fn default_hub_addr() -> String {
    "127.0.0.1:4567".to_string()
}

fn default_interval_secs() -> u64 {
    10
}

fn default_persistent_disk_path() -> PathBuf {
    PathBuf::from("/var/vcap/data")
}

fn default_deployment_prefix() -> String {
    DEFAULT_DEPLOYMENT_PREFIX.to_string()
}

fn default_app_lookup_concurrency() -> usize {
    DEFAULT_APP_LOOKUP_CONCURRENCY
}

impl Config {
    /// Default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("boshdash").join("config.yml"))
    }

    /// Load configuration from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()
                .context("No config path given and no config directory available")?,
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Unable to find config file at path: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Unable to read config file: {}", path.display()))?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            anyhow::bail!("interval_secs must be at least 1");
        }
        if let Some(cf) = &self.cf {
            cf.validate()?;
        }
        Ok(())
    }

    /// Directory holding the hub database (config > platform data dir > cwd)
    pub fn data_dir(&self) -> PathBuf {
        self.hub_data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("boshdash")))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(DB_FILE_NAME)
    }

    /// URL the agent posts telemetry to
    pub fn hub_health_url(&self) -> String {
        format!("http://{}/health", self.hub_addr)
    }
}
