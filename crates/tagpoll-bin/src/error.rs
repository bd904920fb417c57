// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the tagpoll binary.

use tagpoll_opcua::OpcUaError;
use thiserror::Error;

/// Result type alias for tagpoll-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that can occur in the tagpoll binary.
#[derive(Debug, Error)]
pub enum BinError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Config loading error.
    #[error("Config error: {0}")]
    Config(#[from] tagpoll_config::ConfigError),

    /// Connector error.
    #[error("OPC UA error: {0}")]
    Connector(#[from] OpcUaError),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        /// The context description.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Creates an I/O error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Adds context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the exit code for this error.
    ///
    /// An interrupted connector operation exits with 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Config(_) => 1,
            Self::Connector(OpcUaError::Configuration(_)) => 1,
            Self::Connector(e) if e.is_cancelled() => 0,
            Self::Initialization(_) => 2,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::Connector(_) => 5,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::Runtime(format!("{:#}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }

    if let BinError::Connector(e) = error {
        for hint in e.recovery_hints() {
            eprintln!("  Hint: {}", hint);
        }
    }
}

/// Reports an error and exits with the appropriate code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tagpoll_opcua::ConfigurationError;

    #[test]
    fn test_error_creation() {
        let err = BinError::config("no node ids");
        assert_eq!(err.to_string(), "Configuration error: no node ids");
    }

    #[test]
    fn test_error_with_context() {
        let err = BinError::io("broken pipe").with_context("writing readings");
        assert_eq!(err.to_string(), "writing readings: I/O error: broken pipe");
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::config("test").exit_code(), 1);
        assert_eq!(BinError::init("test").exit_code(), 2);
        assert_eq!(BinError::runtime("test").exit_code(), 3);
        assert_eq!(BinError::io("test").exit_code(), 4);
        assert_eq!(BinError::from(OpcUaError::not_connected()).exit_code(), 5);
        assert_eq!(
            BinError::from(OpcUaError::configuration(ConfigurationError::NoRootNodes)).exit_code(),
            1
        );
        assert_eq!(BinError::from(OpcUaError::cancelled("connect")).exit_code(), 0);
    }
}
