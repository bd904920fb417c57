// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors raised while loading a tagpoll configuration.
//!
//! ```text
//! ConfigError
//! ├── file access   FileNotFound, Io, UnsupportedFormat
//! ├── decoding      Parse (with path), Serialization (from a string)
//! └── content       Validation, MissingField, InvalidEnvVar
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("Config file not found: {}", path.display())]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("Cannot read config file '{}': {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The extension names no known format.
    #[error("Unsupported config format '{format}' (expected yaml, yml, toml or json)")]
    UnsupportedFormat {
        /// Offending extension.
        format: String,
    },

    /// A file did not decode into the schema.
    #[error("Invalid config file '{}': {message}", path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// In-memory content did not decode into the schema.
    #[error("Invalid config: {message}")]
    Serialization {
        /// Decoder message.
        message: String,
    },

    /// A key holds an unusable value.
    #[error("{field}: {message}")]
    Validation {
        /// Dotted key, e.g. `opcua.node_ids[1]`.
        field: String,
        /// Reason.
        message: String,
    },

    /// A mandatory key is absent or empty.
    #[error("{field} is required")]
    MissingField {
        /// Dotted key.
        field: String,
    },

    /// An override variable holds an unusable value.
    #[error("Environment override {name}: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Reason.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error for the file at `path`.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Creates a read error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an override error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a decoding error without a file path.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if the file itself could not be opened.
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. } | Self::Io { .. } | Self::UnsupportedFormat { .. }
        )
    }

    /// Returns the configuration key or variable the error points at.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::MissingField { field } => Some(field),
            Self::InvalidEnvVar { name, .. } => Some(name),
            _ => None,
        }
    }
}
