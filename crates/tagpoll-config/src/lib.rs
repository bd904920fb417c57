// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tagpoll-config
//!
//! Configuration management for the tagpoll OPC UA connector.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` in the raw file
//! - **Environment Overrides**: `TAGPOLL_ENDPOINT`, `TAGPOLL_USERNAME`,
//!   `TAGPOLL_PASSWORD` and `TAGPOLL_NODE_IDS`
//! - **Validation**: endpoint scheme, node id syntax and credential pairing
//!
//! ## Quick Start
//!
//! ```no_run
//! use tagpoll_config::load_config;
//!
//! let config = load_config("tagpoll.yaml").unwrap();
//! let connector = config.connector_config().unwrap();
//!
//! println!("Endpoint: {}", connector.endpoint);
//! println!("Roots: {}", connector.root_node_ids.len());
//! ```
//!
//! ## Configuration Schema
//!
//! ```yaml
//! opcua:
//!   endpoint: "opc.tcp://${PLC_HOST:localhost}:4840"
//!   username: ""
//!   password: ""
//!   node_ids: ["ns=2;s=Line1"]
//! browse:
//!   dedupe_visited: false
//! output:
//!   format: json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod loader;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    BrowseSection, OpcUaSection, OutputFormat, OutputSection, SecretValue, TagPollConfig,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
