// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for tagpoll.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse YAML, TOML or JSON into [`TagPollConfig`]
//! 4. Apply environment variable overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! TAGPOLL_ENDPOINT=opc.tcp://10.0.0.5:4840
//! TAGPOLL_USERNAME=operator
//! TAGPOLL_PASSWORD=secret
//! TAGPOLL_NODE_IDS=ns=2;s=Line1,ns=2;s=Line2
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{SecretValue, TagPollConfig};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "TAGPOLL";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for tagpoll.
///
/// # Examples
///
/// ```no_run
/// use tagpoll_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("tagpoll.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholder resolution and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<TagPollConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let format = ConfigFormat::from_path(path)?;
        let content = read_file(path)?;

        let config = self.process(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        info!("Configuration loaded successfully");
        debug!(
            endpoint = %config.opcua.endpoint,
            node_ids = config.opcua.node_ids.len(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<TagPollConfig> {
        self.process(content, format)
    }

    fn process(&self, content: &str, format: ConfigFormat) -> ConfigResult<TagPollConfig> {
        let lookup = |name: &str| env::var(name).ok();

        let mut config: TagPollConfig = if self.resolve_env_vars {
            parse_str(&resolve_placeholders(content, lookup), format)?
        } else {
            parse_str(content, format)?
        };

        if self.resolve_env_vars {
            self.apply_overrides(&mut config, lookup)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Applies `<PREFIX>_*` overrides from `lookup`.
    fn apply_overrides<F>(&self, config: &mut TagPollConfig, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| format!("{}_{}", self.env_prefix, suffix);

        if let Some(value) = lookup(&var("ENDPOINT")) {
            debug!(variable = %var("ENDPOINT"), "Applying override");
            config.opcua.endpoint = value;
        }
        if let Some(value) = lookup(&var("USERNAME")) {
            config.opcua.username = Some(SecretValue::new(value));
        }
        if let Some(value) = lookup(&var("PASSWORD")) {
            config.opcua.password = Some(SecretValue::new(value));
        }
        if let Some(value) = lookup(&var("NODE_IDS")) {
            let node_ids = split_node_ids(&value);
            if node_ids.is_empty() {
                return Err(ConfigError::invalid_env_var(
                    var("NODE_IDS"),
                    "expected a comma-separated list of node ids",
                ));
            }
            debug!(variable = %var("NODE_IDS"), count = node_ids.len(), "Applying override");
            config.opcua.node_ids = node_ids;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::file_not_found(path));
    }

    fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
}

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Resolves `${VAR}` and `${VAR:default}` placeholders.
///
/// An unknown variable without a default is kept verbatim, as is an
/// unterminated placeholder.
fn resolve_placeholders<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (lookup(name), default) {
            (Some(value), _) => result.push_str(&value),
            (None, Some(default)) => result.push_str(default),
            (None, None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    result
}

fn split_node_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<TagPollConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<TagPollConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
