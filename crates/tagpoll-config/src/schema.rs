// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema definitions for tagpoll.
//!
//! # Schema Structure
//!
//! ```text
//! TagPollConfig
//! ├── opcua: OpcUaSection
//! ├── browse: BrowseSection
//! └── output: OutputSection
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use tagpoll_opcua::types::validate_endpoint;
use tagpoll_opcua::{ConnectorConfig, NodeId};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Top-Level Configuration
// =============================================================================

/// The root configuration structure for tagpoll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagPollConfig {
    /// Server connection and browse roots.
    pub opcua: OpcUaSection,

    /// Browse behaviour.
    #[serde(default)]
    pub browse: BrowseSection,

    /// Output of the `run` command.
    #[serde(default)]
    pub output: OutputSection,
}

impl TagPollConfig {
    /// Validates the configuration.
    ///
    /// A half-configured credential pair is not an error; the session falls
    /// back to anonymous and a warning is logged.
    pub fn validate(&self) -> ConfigResult<()> {
        self.opcua.validate()?;

        for warning in self.warnings() {
            tracing::warn!("{}", warning);
        }

        Ok(())
    }

    /// Returns the non-fatal findings of validation.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.opcua.has_username() != self.opcua.has_password() {
            warnings.push(
                "opcua.username and opcua.password must be set together; connecting anonymously"
                    .to_string(),
            );
        }
        warnings
    }

    /// Converts the file schema into the connector configuration.
    pub fn connector_config(&self) -> ConfigResult<ConnectorConfig> {
        let opcua = &self.opcua;
        let mut builder = ConnectorConfig::builder()
            .endpoint(&opcua.endpoint)
            .credentials(opcua.username(), opcua.password())
            .root_node_ids(opcua.node_ids.iter().map(|s| s.trim()))
            .dedupe_visited(self.browse.dedupe_visited);

        if let Some(name) = opcua.application_name.as_deref().filter(|s| !s.is_empty()) {
            builder = builder.application_name(name);
        }
        if let Some(hint) = opcua.identity_hint.as_deref().filter(|s| !s.is_empty()) {
            builder = builder.identity_hint(hint);
        }
        if let Some(secs) = opcua.session_timeout_secs {
            builder = builder.session_timeout(Duration::from_secs(secs));
        }

        builder
            .build()
            .map_err(|e| ConfigError::validation("opcua", e.to_string()))
    }
}

// =============================================================================
// OPC UA Section
// =============================================================================

/// OPC UA connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpcUaSection {
    /// Endpoint URL (`opc.tcp://host:port`).
    pub endpoint: String,

    /// Username (optional).
    #[serde(default)]
    pub username: Option<SecretValue>,

    /// Password (optional).
    #[serde(default)]
    pub password: Option<SecretValue>,

    /// Browse roots in OPC UA text form.
    #[serde(default)]
    pub node_ids: Vec<String>,

    /// Application name presented to the server.
    #[serde(default)]
    pub application_name: Option<String>,

    /// Hint used in the client certificate URI.
    #[serde(default)]
    pub identity_hint: Option<String>,

    /// Requested session timeout in seconds.
    #[serde(default)]
    pub session_timeout_secs: Option<u64>,
}

impl OpcUaSection {
    /// Validates the section.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_endpoint(&self.endpoint)
            .map_err(|e| ConfigError::validation("opcua.endpoint", e.to_string()))?;

        if self.node_ids.is_empty() {
            return Err(ConfigError::missing_field("opcua.node_ids"));
        }
        for (i, raw) in self.node_ids.iter().enumerate() {
            raw.trim().parse::<NodeId>().map_err(|e| {
                ConfigError::validation(format!("opcua.node_ids[{}]", i), e.to_string())
            })?;
        }

        if self.session_timeout_secs == Some(0) {
            return Err(ConfigError::validation(
                "opcua.session_timeout_secs",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Returns the username, empty if unset.
    pub fn username(&self) -> &str {
        self.username.as_ref().map(SecretValue::expose).unwrap_or("")
    }

    /// Returns the password, empty if unset.
    pub fn password(&self) -> &str {
        self.password.as_ref().map(SecretValue::expose).unwrap_or("")
    }

    fn has_username(&self) -> bool {
        !self.username().is_empty()
    }

    fn has_password(&self) -> bool {
        !self.password().is_empty()
    }
}

// =============================================================================
// Browse / Output Sections
// =============================================================================

/// Browse settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrowseSection {
    /// Skip nodes already visited on the current browse.
    #[serde(default)]
    pub dedupe_visited: bool,
}

/// Output settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// Line format for readings.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Line format for readings written by `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// `path (node_id) = payload` per line.
    Text,
}

// =============================================================================
// Secret Value
// =============================================================================

/// A credential that never prints its value.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    /// Creates a new secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the plain value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl std::fmt::Display for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            Ok(())
        } else {
            write!(f, "***")
        }
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretValue({})", self)
    }
}
