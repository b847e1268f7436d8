//! Provider chain configuration.
//!
//! Sources, highest precedence first: command-line flags / environment
//! variables (`QUOTA_SEARCH_CONFIG`, `QUOTA_SEARCH_PRIMARY`,
//! `QUOTA_SEARCH_USAGE_FILE`), the JSON config file, built-in defaults.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::providers::ProviderFamily;

const APP_DIR: &str = "quota-search";

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// JSON file describing the provider chain
    #[arg(long, env = "QUOTA_SEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Provider id to try first
    #[arg(long, env = "QUOTA_SEARCH_PRIMARY")]
    pub primary: Option<String>,

    /// Where per-provider monthly usage is persisted
    #[arg(long, env = "QUOTA_SEARCH_USAGE_FILE")]
    pub usage_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no providers configured")]
    NoProviders,

    #[error("provider id must not be empty")]
    EmptyId,

    #[error("duplicate provider id '{0}'")]
    DuplicateId(String),

    #[error("provider '{0}' has no apiKeyEnv")]
    MissingKeyName(String),

    #[error("provider '{0}' must have a monthlyLimit greater than zero")]
    ZeroLimit(String),

    #[error("provider '{id}' has an invalid endpoint: {source}")]
    InvalidEndpoint { id: String, source: url::ParseError },
}

/// One configured search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub family: ProviderFamily,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub monthly_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Extra request fields, used by custom backends.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl ProviderSpec {
    fn builtin(id: &str, family: ProviderFamily, api_key_env: &str, monthly_limit: u32) -> Self {
        Self {
            id: id.to_string(),
            family,
            api_key_env: api_key_env.to_string(),
            monthly_limit,
            endpoint: None,
            options: Map::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    primary: Option<String>,
    usage_file: Option<PathBuf>,
    credentials_file: Option<PathBuf>,
    #[serde(default)]
    providers: Vec<ProviderSpec>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub providers: Vec<ProviderSpec>,
    pub primary: Option<String>,
    pub usage_file: PathBuf,
    pub credentials_file: PathBuf,
}

impl Config {
    /// Resolve the effective configuration. An explicitly named config file
    /// must exist; the default location may be absent, in which case the
    /// built-in provider chain is used.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => read_config_file(path)?,
            None => {
                let path = default_config_path();
                match read_config_file(&path) {
                    Err(ConfigError::Read { source, .. })
                        if source.kind() == io::ErrorKind::NotFound =>
                    {
                        debug!(path = %path.display(), "no config file, using built-in providers");
                        ConfigFile::default()
                    }
                    other => other?,
                }
            }
        };

        let providers = if file.providers.is_empty() && args.config.is_none() {
            builtin_providers()
        } else {
            file.providers
        };
        validate(&providers)?;

        let config = Self {
            providers,
            primary: args.primary.clone().or(file.primary),
            usage_file: args
                .usage_file
                .clone()
                .or(file.usage_file)
                .unwrap_or_else(default_usage_path),
            credentials_file: file
                .credentials_file
                .unwrap_or_else(default_credentials_path),
        };
        info!(
            providers = config.providers.len(),
            primary = config.primary.as_deref().unwrap_or("-"),
            usage_file = %config.usage_file.display(),
            "configuration resolved"
        );
        Ok(config)
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate(providers: &[ProviderSpec]) -> Result<(), ConfigError> {
    if providers.is_empty() {
        return Err(ConfigError::NoProviders);
    }

    let mut seen = HashSet::new();
    for spec in providers {
        if spec.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if !seen.insert(spec.id.as_str()) {
            return Err(ConfigError::DuplicateId(spec.id.clone()));
        }
        if spec.api_key_env.trim().is_empty() {
            return Err(ConfigError::MissingKeyName(spec.id.clone()));
        }
        if spec.monthly_limit == 0 {
            return Err(ConfigError::ZeroLimit(spec.id.clone()));
        }
        if let Some(endpoint) = &spec.endpoint {
            url::Url::parse(endpoint).map_err(|source| ConfigError::InvalidEndpoint {
                id: spec.id.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Free-tier monthly request allowances of the supported hosted APIs.
pub fn builtin_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec::builtin("brave", ProviderFamily::Brave, "BRAVE_API_KEY", 2000),
        ProviderSpec::builtin("tavily", ProviderFamily::Tavily, "TAVILY_API_KEY", 1000),
        ProviderSpec::builtin("serper", ProviderFamily::Serper, "SERPER_API_KEY", 2500),
    ]
}

fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn default_credentials_path() -> PathBuf {
    config_dir().join("credentials.json")
}

fn default_usage_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
        .join("usage.json")
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}
