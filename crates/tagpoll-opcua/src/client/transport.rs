// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! [`UaTransport`] discovers endpoints and opens sessions; [`UaSession`] is the
//! live handle browsing and polling run against. The `opcua` crate backed
//! implementation lives behind the `real-transport` feature, tests substitute
//! in-memory graphs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::certificate::ClientIdentity;
use crate::error::{OpcUaError, OpcUaResult};
use crate::status;
use crate::types::{AttributeId, EndpointDescription, NodeClass, NodeId, UserIdentity};

// =============================================================================
// OpcUaValue
// =============================================================================

/// A decoded OPC UA variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),

    /// Signed byte.
    SByte(i8),

    /// Unsigned byte.
    Byte(u8),

    /// 16-bit signed integer.
    Int16(i16),

    /// 16-bit unsigned integer.
    UInt16(u16),

    /// 32-bit signed integer.
    Int32(i32),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 64-bit unsigned integer.
    UInt64(u64),

    /// 32-bit float.
    Float(f32),

    /// 64-bit double.
    Double(f64),

    /// String value.
    String(String),

    /// Date/time value.
    DateTime(DateTime<Utc>),

    /// GUID value.
    Guid(uuid::Uuid),

    /// Byte string.
    ByteString(Vec<u8>),

    /// Node identifier, as carried by the DataType attribute.
    NodeId(NodeId),

    /// Qualified name, as carried by the BrowseName attribute.
    QualifiedName {
        /// Namespace index.
        namespace_index: u16,
        /// Name.
        name: String,
    },

    /// Localized text, as carried by the Description attribute.
    LocalizedText(String),

    /// Array of values.
    Array(Vec<OpcUaValue>),

    /// A variant the connector has no representation for, by type name.
    Other(String),

    /// Empty variant.
    #[default]
    Null,
}

impl OpcUaValue {
    /// Returns the variant type name.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::SByte(_) => "SByte",
            Self::Byte(_) => "Byte",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::UInt64(_) => "UInt64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
            Self::Guid(_) => "Guid",
            Self::ByteString(_) => "ByteString",
            Self::NodeId(_) => "NodeId",
            Self::QualifiedName { .. } => "QualifiedName",
            Self::LocalizedText(_) => "LocalizedText",
            Self::Array(_) => "Array",
            Self::Other(name) => name,
            Self::Null => "Empty",
        }
    }

    /// Returns `true` if this is an empty variant.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an unsigned integer, for enumeration and mask attributes.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Byte(v) => Some(u32::from(*v)),
            Self::UInt16(v) => Some(u32::from(*v)),
            Self::UInt32(v) => Some(*v),
            Self::Int32(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the text of string-like values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::LocalizedText(v) => Some(v),
            Self::QualifiedName { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) | Self::LocalizedText(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{}", v),
            Self::QualifiedName {
                namespace_index,
                name,
            } => write!(f, "{}:{}", namespace_index, name),
            Self::Array(v) => write!(f, "[{} items]", v.len()),
            Self::Other(name) => write!(f, "<{}>", name),
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// One entry of a read response.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    /// The value, absent when the status is bad.
    pub value: Option<OpcUaValue>,

    /// Status code of this entry.
    pub status_code: u32,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// Creates a good data value.
    pub fn good(value: OpcUaValue) -> Self {
        Self {
            value: Some(value),
            status_code: status::GOOD,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// Creates a data value carrying only a status.
    pub fn bad(status_code: u32) -> Self {
        Self {
            value: None,
            status_code,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// Sets both timestamps.
    pub fn with_timestamps(mut self, source: DateTime<Utc>, server: DateTime<Utc>) -> Self {
        self.source_timestamp = Some(source);
        self.server_timestamp = Some(server);
        self
    }

    /// Returns `true` if the status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        status::is_good(self.status_code)
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        status::is_bad(self.status_code)
    }
}

// =============================================================================
// ReadValueId / ReferenceDescription
// =============================================================================

/// One item of a read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadValueId {
    /// Node to read.
    pub node_id: NodeId,
    /// Attribute to read.
    pub attribute: AttributeId,
}

impl ReadValueId {
    /// Creates a read item.
    pub fn new(node_id: NodeId, attribute: AttributeId) -> Self {
        Self { node_id, attribute }
    }

    /// Creates a Value attribute read item.
    pub fn value(node_id: NodeId) -> Self {
        Self::new(node_id, AttributeId::Value)
    }
}

/// A forward reference returned by browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDescription {
    /// Target node.
    pub node_id: NodeId,
    /// Target browse name.
    pub browse_name: String,
    /// Target node class.
    pub node_class: NodeClass,
}

// =============================================================================
// SessionOptions
// =============================================================================

/// Everything needed to open a session against a chosen endpoint.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The chosen endpoint.
    pub endpoint: EndpointDescription,
    /// Policy id of the user token policy matching `identity`.
    pub user_token_policy_id: String,
    /// User identity for session activation.
    pub identity: UserIdentity,
    /// Client certificate and key for the secure channel.
    pub client_identity: ClientIdentity,
    /// Client application name.
    pub application_name: String,
    /// Requested session timeout.
    pub session_timeout: Duration,
}

// =============================================================================
// Traits
// =============================================================================

/// Discovery and session establishment.
#[async_trait]
pub trait UaTransport: Send + Sync {
    /// Fetches the endpoints advertised at `url`.
    async fn discover_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>>;

    /// Opens a secure channel and activates a session.
    async fn open_session(&self, options: SessionOptions) -> OpcUaResult<Arc<dyn UaSession>>;

    /// Returns the transport display name for logging.
    fn display_name(&self) -> String;
}

/// A live session.
///
/// Service-level failures surface as errors carrying the status code.
/// Per-item statuses are reported inside the returned entries.
#[async_trait]
pub trait UaSession: Send + Sync {
    /// Reads attributes in one request.
    ///
    /// The response is positionally aligned with `items`.
    async fn read(&self, items: &[ReadValueId], max_age: Duration) -> OpcUaResult<Vec<DataValue>>;

    /// Follows forward references of one type, subtypes included.
    async fn browse(
        &self,
        node_id: &NodeId,
        reference_type: &NodeId,
    ) -> OpcUaResult<Vec<ReferenceDescription>>;

    /// Closes the session and its channel.
    async fn close(&self) -> OpcUaResult<()>;

    /// Returns the URL the session is connected to.
    fn endpoint_url(&self) -> &str;
}

// =============================================================================
// Cancellation
// =============================================================================

/// Races `future` against `cancel`.
///
/// Returns [`OpcUaError::Cancelled`] for `operation` if the token fires first.
/// A token that is already cancelled wins without polling `future`.
pub async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &str,
    future: F,
) -> OpcUaResult<T>
where
    F: Future<Output = OpcUaResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OpcUaError::cancelled(operation)),
        result = future => result,
    }
}

// =============================================================================
// Tests
// =============================================================================
