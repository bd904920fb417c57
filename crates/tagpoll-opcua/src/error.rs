// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA tag-polling connector.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Discovery, endpoint selection and connect steps
//! ├── Session       - Session lifecycle and lost sessions
//! ├── Certificate   - Ephemeral client identity generation
//! ├── Browse        - Address-space traversal failures
//! ├── Operation     - Read service failures
//! ├── Configuration - Invalid settings, fatal at startup
//! └── Cancelled     - Aborted by the caller's cancellation token
//! ```
//!
//! # Examples
//!
//! ```
//! use tagpoll_opcua::error::{ConnectionError, OpcUaError};
//!
//! let error = OpcUaError::connection(ConnectionError::no_suitable_endpoint(
//!     "opc.tcp://localhost:4840",
//!     "UserName",
//! ));
//!
//! assert!(!error.is_retryable());
//! for hint in error.recovery_hints() {
//!     println!("Hint: {}", hint);
//! }
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::status;

// =============================================================================
// OpcUaError - Main Error Type
// =============================================================================

/// The main error type for connector operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Client identity errors.
    #[error("{0}")]
    Certificate(#[from] CertificateError),

    /// Node browsing errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Read operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The operation was aborted through its cancellation token.
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The operation that was in flight.
        operation: String,
    },
}

impl OpcUaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates a certificate error.
    #[inline]
    pub fn certificate(error: CertificateError) -> Self {
        Self::Certificate(error)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(error: BrowseError) -> Self {
        Self::Browse(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a cancellation error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a service fault carrying a raw status code.
    pub fn service_fault(service: impl Into<String>, status_code: u32) -> Self {
        Self::Operation(OperationError::service_fault(service, status_code))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this is a cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Connection(ConnectionError::ConnectFailed { source, .. }) => {
                source.is_cancelled()
            }
            _ => false,
        }
    }

    /// Returns the OPC UA status code behind this error, if there is one.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::Connection(e) => e.status_code(),
            Self::Session(e) => e.status_code(),
            Self::Browse(e) => e.status_code(),
            Self::Operation(e) => e.status_code(),
            Self::Certificate(_) | Self::Configuration(_) | Self::Cancelled { .. } => None,
        }
    }

    /// Returns `true` if the session must be torn down and rebuilt.
    pub fn requires_reconnect(&self) -> bool {
        if matches!(self, Self::Session(SessionError::Lost { .. })) {
            return true;
        }
        self.status_code().is_some_and(status::is_session_fatal)
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Configuration, certificate and endpoint-selection failures are setup
    /// errors; retrying them cannot succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(e) => e.is_retryable(),
            Self::Certificate(_) => false,
            Self::Browse(e) => e.is_retryable(),
            Self::Operation(e) => e.is_retryable(),
            Self::Configuration(_) => false,
            Self::Cancelled { .. } => false,
        }
    }

    /// Returns the suggested retry delay for this error.
    ///
    /// Returns `None` if the error is not retryable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        if !self.is_retryable() {
            return None;
        }

        match self {
            Self::Connection(e) => Some(e.suggested_retry_delay()),
            Self::Session(_) => Some(Duration::from_secs(1)),
            Self::Browse(_) => Some(Duration::from_secs(2)),
            Self::Operation(_) => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Session(e) => e.severity(),
            Self::Certificate(_) => ErrorSeverity::Critical,
            Self::Browse(_) => ErrorSeverity::Error,
            Self::Operation(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
            Self::Cancelled { .. } => ErrorSeverity::Info,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Certificate(_) => "certificate",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Configuration(_) => "configuration",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Session(e) => e.error_code(),
            Self::Certificate(e) => e.error_code(),
            Self::Browse(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
            Self::Cancelled { .. } => ErrorCode::new(9, 1),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Connection(e) => e.recovery_hints(),
            Self::Session(e) => e.recovery_hints(),
            Self::Certificate(e) => e.recovery_hints(),
            Self::Browse(e) => e.recovery_hints(),
            Self::Operation(e) => e.recovery_hints(),
            Self::Configuration(e) => e.recovery_hints(),
            Self::Cancelled { .. } => vec![],
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectStep
// =============================================================================

/// The step of the connect sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectStep {
    /// Endpoint discovery against the configured address.
    Discover,
    /// Choosing an endpoint for the desired authentication mode.
    SelectEndpoint,
    /// Generating the ephemeral client identity.
    Provision,
    /// Building client options from endpoint, credentials and identity.
    AssembleOptions,
    /// Opening the secure channel and activating the session.
    Open,
}

impl ConnectStep {
    /// Returns the step name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::SelectEndpoint => "select_endpoint",
            Self::Provision => "provision",
            Self::AssembleOptions => "assemble_options",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for ConnectStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A step of the connect sequence failed.
    #[error("Connect failed during {step} against '{endpoint}': {source}")]
    ConnectFailed {
        /// The failing step.
        step: ConnectStep,
        /// The configured endpoint.
        endpoint: String,
        /// Underlying error.
        #[source]
        source: Box<OpcUaError>,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint discovery failed for '{endpoint}': {message}")]
    DiscoveryFailed {
        /// The discovery URL.
        endpoint: String,
        /// Error message.
        message: String,
        /// Status code reported by the stack.
        status_code: Option<u32>,
    },

    /// No advertised endpoint accepts the desired authentication mode.
    #[error("No suitable endpoint found at '{endpoint}' for authentication mode '{auth_mode}'")]
    NoSuitableEndpoint {
        /// The discovery URL.
        endpoint: String,
        /// The desired authentication mode.
        auth_mode: String,
    },

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: '{url}' - {reason}")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Not connected.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// Generic I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConnectionError {
    /// Wraps an error with the connect step it happened in.
    pub fn connect_failed(
        step: ConnectStep,
        endpoint: impl Into<String>,
        source: OpcUaError,
    ) -> Self {
        Self::ConnectFailed {
            step,
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// Creates a discovery failed error.
    pub fn discovery_failed(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u32>,
    ) -> Self {
        Self::DiscoveryFailed {
            endpoint: endpoint.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a no suitable endpoint error.
    pub fn no_suitable_endpoint(endpoint: impl Into<String>, auth_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            endpoint: endpoint.into(),
            auth_mode: auth_mode.into(),
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns the failing connect step, if this is a connect failure.
    pub fn step(&self) -> Option<ConnectStep> {
        match self {
            Self::ConnectFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Returns the status code behind this error.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::ConnectFailed { source, .. } => source.status_code(),
            Self::DiscoveryFailed { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectFailed { source, .. } => source.is_retryable(),
            Self::DiscoveryFailed { .. } => true,
            Self::NotConnected => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            Self::NoSuitableEndpoint { .. } | Self::InvalidEndpoint { .. } => false,
        }
    }

    /// Returns the suggested retry delay.
    pub fn suggested_retry_delay(&self) -> Duration {
        match self {
            Self::ConnectFailed { source, .. } => source
                .suggested_retry_delay()
                .unwrap_or(Duration::from_secs(5)),
            Self::DiscoveryFailed { .. } => Duration::from_secs(5),
            Self::NotConnected => Duration::from_millis(100),
            Self::Io { .. } => Duration::from_secs(1),
            _ => Duration::from_secs(5),
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ConnectFailed { source, .. } => source.severity(),
            Self::NotConnected => ErrorSeverity::Warning,
            Self::NoSuitableEndpoint { .. } | Self::InvalidEndpoint { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConnectFailed { .. } => ErrorCode::new(1, 1),
            Self::DiscoveryFailed { .. } => ErrorCode::new(1, 2),
            Self::NoSuitableEndpoint { .. } => ErrorCode::new(1, 3),
            Self::InvalidEndpoint { .. } => ErrorCode::new(1, 4),
            Self::NotConnected => ErrorCode::new(1, 5),
            Self::Io { .. } => ErrorCode::new(1, 6),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::ConnectFailed { source, .. } => source.recovery_hints(),
            Self::DiscoveryFailed { .. } => vec![
                "Check if the OPC UA server is running",
                "Verify the endpoint URL is correct",
                "Check firewall rules allow the connection",
            ],
            Self::NoSuitableEndpoint { .. } => vec![
                "Check which user token policies the server advertises",
                "Configure both username and password for UserName authentication",
                "Leave both empty for anonymous authentication",
            ],
            Self::InvalidEndpoint { .. } => vec![
                "Use format: opc.tcp://hostname:port/path",
                "Verify the hostname and port are correct",
            ],
            Self::NotConnected => vec!["Call connect() before performing operations"],
            Self::Io { .. } => vec!["Check network connectivity", "Retry the operation"],
        }
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening or activating the session failed.
    #[error("Failed to create session: {message}")]
    CreationFailed {
        /// Error message.
        message: String,
        /// Status code reported by the stack.
        status_code: Option<u32>,
    },

    /// The server reported a status that invalidates the session.
    #[error("Session lost: {status_name} (0x{status_code:08X})")]
    Lost {
        /// The fatal status code.
        status_code: u32,
        /// Symbolic status name.
        status_name: String,
    },
}

impl SessionError {
    /// Creates a session creation failed error.
    pub fn creation_failed(message: impl Into<String>, status_code: Option<u32>) -> Self {
        Self::CreationFailed {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a session lost error.
    pub fn lost(status_code: u32) -> Self {
        Self::Lost {
            status_code,
            status_name: status::status_code_name(status_code).to_string(),
        }
    }

    /// Returns the status code behind this error.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::CreationFailed { status_code, .. } => *status_code,
            Self::Lost { status_code, .. } => Some(*status_code),
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CreationFailed { status_code, .. } => !matches!(
                status_code.map(|c| c & 0xFFFF_0000),
                Some(status::BAD_USER_ACCESS_DENIED)
                    | Some(status::BAD_IDENTITY_TOKEN_INVALID)
                    | Some(status::BAD_IDENTITY_TOKEN_REJECTED)
            ),
            Self::Lost { .. } => true,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CreationFailed { .. } => ErrorSeverity::Error,
            Self::Lost { .. } => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CreationFailed { .. } => ErrorCode::new(2, 1),
            Self::Lost { .. } => ErrorCode::new(2, 2),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::CreationFailed { .. } => vec![
                "Verify the configured credentials",
                "Check that the server accepts the client certificate",
                "Check the server session limits",
            ],
            Self::Lost { .. } => vec![
                "Reconnect and rebuild the tag list",
                "Check the network path to the server",
            ],
        }
    }
}

// =============================================================================
// CertificateError
// =============================================================================

/// Ephemeral client identity errors.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// Key pair generation failed.
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Error message.
        message: String,
    },

    /// Certificate or key encoding failed.
    #[error("Certificate encoding failed: {message}")]
    Encoding {
        /// Error message.
        message: String,
    },

    /// The application URI could not be placed in the certificate.
    #[error("Invalid application URI '{uri}': {reason}")]
    InvalidUri {
        /// The URI.
        uri: String,
        /// Reason.
        reason: String,
    },

    /// The server certificate could not be decoded.
    #[error("Invalid server certificate: {message}")]
    ServerCertificate {
        /// Error message.
        message: String,
    },

    /// Writing the identity for the protocol stack failed.
    #[error("Failed to stage client identity: {message}")]
    Staging {
        /// Error message.
        message: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl CertificateError {
    /// Creates a key generation error.
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates an invalid URI error.
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates a server certificate error.
    pub fn server_certificate(message: impl Into<String>) -> Self {
        Self::ServerCertificate {
            message: message.into(),
        }
    }

    /// Creates a staging error.
    pub fn staging(message: impl Into<String>, source: io::Error) -> Self {
        Self::Staging {
            message: message.into(),
            source,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::KeyGeneration { .. } => ErrorCode::new(3, 1),
            Self::Encoding { .. } => ErrorCode::new(3, 2),
            Self::InvalidUri { .. } => ErrorCode::new(3, 3),
            Self::Staging { .. } => ErrorCode::new(3, 4),
            Self::ServerCertificate { .. } => ErrorCode::new(3, 5),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidUri { .. } => {
                vec!["Use an identity hint made of letters, digits and '-'"]
            }
            Self::Staging { .. } => vec!["Check that the temporary directory is writable"],
            Self::ServerCertificate { .. } => {
                vec!["Check the certificate the server advertises on its endpoints"]
            }
            _ => vec!["Check system entropy and crypto backend availability"],
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Node browsing errors.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// An attribute read returned a status other than Good or "not applicable".
    #[error("Reading {attribute} of '{node_id}' failed: {status_name} (0x{status_code:08X})")]
    AttributeStatus {
        /// The node being browsed.
        node_id: String,
        /// The attribute name.
        attribute: &'static str,
        /// The status code.
        status_code: u32,
        /// Symbolic status name.
        status_name: String,
    },

    /// A mandatory attribute came back Good but without a usable value.
    #[error("Attribute {attribute} of '{node_id}' has no usable value")]
    MissingAttribute {
        /// The node being browsed.
        node_id: String,
        /// The attribute name.
        attribute: &'static str,
    },

    /// Following references failed.
    #[error("References {reference_type} of '{node_id}' failed: {message}")]
    ReferencesFailed {
        /// The node being browsed.
        node_id: String,
        /// The reference type.
        reference_type: String,
        /// Error message.
        message: String,
        /// Status code reported by the stack.
        status_code: Option<u32>,
    },

    /// The attribute response did not match the request.
    #[error("Attribute response for '{node_id}' has {actual} entries, expected {expected}")]
    UnexpectedResultCount {
        /// The node being browsed.
        node_id: String,
        /// Expected entries.
        expected: usize,
        /// Actual entries.
        actual: usize,
    },
}

impl BrowseError {
    /// Creates an attribute status error.
    pub fn attribute_status(
        node_id: impl Into<String>,
        attribute: &'static str,
        status_code: u32,
    ) -> Self {
        Self::AttributeStatus {
            node_id: node_id.into(),
            attribute,
            status_code,
            status_name: status::status_code_name(status_code).to_string(),
        }
    }

    /// Creates a missing attribute error.
    pub fn missing_attribute(node_id: impl Into<String>, attribute: &'static str) -> Self {
        Self::MissingAttribute {
            node_id: node_id.into(),
            attribute,
        }
    }

    /// Creates a references failed error.
    pub fn references_failed(
        node_id: impl Into<String>,
        reference_type: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u32>,
    ) -> Self {
        Self::ReferencesFailed {
            node_id: node_id.into(),
            reference_type: reference_type.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Returns the status code behind this error.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::AttributeStatus { status_code, .. } => Some(*status_code),
            Self::ReferencesFailed { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Returns `true` if this error is retryable.
    ///
    /// Node-level failures are reported to the caller, which may browse again.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AttributeStatus { .. } => ErrorCode::new(4, 1),
            Self::MissingAttribute { .. } => ErrorCode::new(4, 2),
            Self::ReferencesFailed { .. } => ErrorCode::new(4, 3),
            Self::UnexpectedResultCount { .. } => ErrorCode::new(4, 4),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::AttributeStatus { .. } | Self::MissingAttribute { .. } => vec![
                "Check that the root node ids exist on the server",
                "Check the user's read permissions on the subtree",
            ],
            _ => vec!["Retry after reconnecting"],
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Read operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A service call failed with a status code.
    #[error("{service} failed: {status_name} (0x{status_code:08X})")]
    ServiceFault {
        /// The service name.
        service: String,
        /// The status code.
        status_code: u32,
        /// Symbolic status name.
        status_name: String,
    },

    /// The read response is not aligned with the request.
    #[error("Read returned {actual} results for {expected} nodes")]
    ResultCountMismatch {
        /// Requested nodes.
        expected: usize,
        /// Returned results.
        actual: usize,
    },

    /// The blocking worker running the call was lost.
    #[error("Worker for {operation} failed: {message}")]
    WorkerFailed {
        /// The operation.
        operation: String,
        /// Error message.
        message: String,
    },
}

impl OperationError {
    /// Creates a service fault.
    pub fn service_fault(service: impl Into<String>, status_code: u32) -> Self {
        Self::ServiceFault {
            service: service.into(),
            status_code,
            status_name: status::status_code_name(status_code).to_string(),
        }
    }

    /// Creates a worker failure.
    pub fn worker_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns the status code behind this error.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::ServiceFault { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::WorkerFailed { .. })
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ServiceFault { status_code, .. } if status::is_session_fatal(*status_code) => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ServiceFault { .. } => ErrorCode::new(5, 1),
            Self::ResultCountMismatch { .. } => ErrorCode::new(5, 2),
            Self::WorkerFailed { .. } => ErrorCode::new(5, 3),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::ServiceFault { .. } => vec![
                "Check the server diagnostics for the reported status",
                "Reduce the number of tags per request if the server limits operations",
            ],
            Self::ResultCountMismatch { .. } => vec!["Report the server as non-conformant"],
            Self::WorkerFailed { .. } => vec!["Check the logs for a panic in the protocol stack"],
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {url} ({reason})")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Reason.
        reason: String,
    },

    /// Invalid node ID format.
    #[error("Invalid node ID format: {node_id} ({reason})")]
    InvalidNodeId {
        /// The invalid node ID.
        node_id: String,
        /// Reason.
        reason: String,
    },

    /// No root node ids were configured.
    #[error("No root node ids configured")]
    NoRootNodes,

    /// Missing required field.
    #[error("Missing required configuration: {field}")]
    MissingField {
        /// The missing field.
        field: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid node ID error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidEndpoint { .. } => ErrorCode::new(8, 1),
            Self::InvalidNodeId { .. } => ErrorCode::new(8, 2),
            Self::NoRootNodes => ErrorCode::new(8, 3),
            Self::MissingField { .. } => ErrorCode::new(8, 4),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidEndpoint { .. } => vec!["Use format: opc.tcp://hostname:port/path"],
            Self::InvalidNodeId { .. } => vec![
                "Use format: ns=<index>;i=<number> or ns=<index>;s=<name>",
                "GUID ids use g=, opaque ids use b= with base64",
            ],
            Self::NoRootNodes => vec!["Configure at least one entry in node_ids"],
            Self::MissingField { .. } => vec!["Add the missing field to the configuration"],
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - the connector cannot proceed.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error => Level::ERROR,
            Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code for categorization.
///
/// Format: `UA-XXYY` where XX is category and YY is specific error.
///
/// Categories:
/// - 1: Connection
/// - 2: Session
/// - 3: Certificate
/// - 4: Browse
/// - 5: Operation
/// - 8: Configuration
/// - 9: Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category.
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UA-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with OpcUaError.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Tests
// =============================================================================
