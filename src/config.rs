//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a missing file is not an error.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::Credentials;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub credentials: CredentialsConfig,
    pub fetch: FetchConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://api-tournament.numer.ai".to_string(),
            timeout_secs: 600,
            user_agent: "numerox/0.1.0".to_string(),
        }
    }
}

/// Names of the env vars holding the API key pair.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CredentialsConfig {
    pub public_id_env: String,
    pub secret_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            public_id_env: "NUMERAI_PUBLIC_ID".to_string(),
            secret_key_env: "NUMERAI_SECRET_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// Rounds fetched in flight at once by the multi-round aggregators.
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    /// Print a progress line as each metric resolves.
    pub verbose: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { verbose: true }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Build credentials from the env vars named in `[credentials]`.
    pub fn credentials(&self) -> Result<Credentials> {
        let public_id = Self::resolve_env(&self.credentials.public_id_env)?;
        let secret_key = Self::resolve_env(&self.credentials.secret_key_env)?;
        Ok(Credentials::new(public_id, secret_key))
    }
}
