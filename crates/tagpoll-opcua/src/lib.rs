// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA tag discovery and polling connector.
//!
//! This crate connects to an OPC UA server, discovers the Variable nodes
//! reachable from configured roots and polls their values in batches.
//!
//! # Features
//!
//! - Endpoint discovery with security-level based endpoint selection
//! - Ephemeral self-signed client identity per connection
//! - Depth-bounded address-space browsing into a flat tag list
//! - Batched polling with fatal-status classification and reconnect signalling
//! - Cancellation of every network operation through a `CancellationToken`
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Discovery, endpoint selection and connect steps
//! ├── Session       - Session lifecycle errors
//! ├── Certificate   - Client identity generation
//! ├── Browse        - Node browsing failures
//! ├── Operation     - Read service failures
//! ├── Configuration - Invalid settings
//! └── Cancelled     - Aborted by the caller
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagpoll_opcua::{ConnectorConfig, RealOpcUaTransport, TagPollDriver};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectorConfig::builder()
//!         .endpoint("opc.tcp://localhost:4840")
//!         .root_node_id("ns=2;s=Line1")
//!         .build()?;
//!
//!     let driver = TagPollDriver::new(config, Arc::new(RealOpcUaTransport::new()));
//!     let cancel = CancellationToken::new();
//!     driver.connect(&cancel).await?;
//!
//!     for reading in driver.read_batch(&cancel).await? {
//!         println!("{} = {}", reading.opcua_path, reading.payload);
//!     }
//!
//!     driver.close(&cancel).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod certificate;
pub mod client;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod poll;
pub mod status;
pub mod types;

pub use browse::{BrowseOptions, NodeTreeBrowser, TagDefinition, MAX_BROWSE_DEPTH};
pub use certificate::{ClientIdentity, IdentityProvider, SelfSignedProvider};
pub use client::{SessionManager, SessionState, UaSession, UaTransport};
pub use driver::TagPollDriver;
pub use endpoint::select_endpoint;
pub use error::{
    BrowseError, CertificateError, ConfigurationError, ConnectStep, ConnectionError, ErrorCode,
    ErrorSeverity, OpcUaError, OpcUaResult, OperationError, SessionError,
};
pub use poll::{sanitize_node_id, PollLoop, PollOutcome, TagReading};
pub use types::{AuthMode, ConnectorConfig, ConnectorConfigBuilder, EndpointDescription, NodeId};

#[cfg(feature = "real-transport")]
pub use client::RealOpcUaTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
