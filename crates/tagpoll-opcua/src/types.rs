// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core value types of the connector.
//!
//! - **NodeId**: the four OPC UA identifier kinds with text parsing
//! - **NodeClass / AttributeId**: the address-space vocabulary used by browsing
//! - **EndpointDescription**: a server-advertised connection option
//! - **AuthMode / UserIdentity**: how the session authenticates
//! - **ConnectorConfig**: everything the core needs to run, with a builder
//!
//! # Examples
//!
//! ```
//! use tagpoll_opcua::types::{AuthMode, ConnectorConfig};
//!
//! let config = ConnectorConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .root_node_id("ns=2;s=Line1")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.auth_mode(), AuthMode::Anonymous);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// OPC UA Node Identifier.
///
/// A NodeId uniquely identifies a node within an OPC UA server.
/// It consists of a namespace index and an identifier which can be
/// numeric, string, GUID, or opaque (byte string).
///
/// # Examples
///
/// ```
/// use tagpoll_opcua::types::NodeId;
///
/// let numeric = NodeId::numeric(2, 1001);
/// let parsed: NodeId = "ns=2;s=MyDevice.Temperature".parse().unwrap();
///
/// assert_eq!(numeric.to_string(), "ns=2;i=1001");
/// assert_eq!(parsed.as_string(), Some("MyDevice.Temperature"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 = OPC UA standard namespace).
    pub namespace_index: u16,

    /// The node identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a numeric node ID.
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node ID.
    #[inline]
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// Creates a GUID node ID.
    #[inline]
    pub fn guid(namespace_index: u16, value: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(value),
        }
    }

    /// Creates an opaque (byte string) node ID.
    #[inline]
    pub fn opaque(namespace_index: u16, value: Vec<u8>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(value),
        }
    }

    // =========================================================================
    // Standard Node IDs
    // =========================================================================

    /// Objects folder node (ns=0, i=85).
    pub const OBJECTS_FOLDER: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(85),
    };

    /// Organizes reference type (ns=0, i=35).
    pub const ORGANIZES: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(35),
    };

    /// HasProperty reference type (ns=0, i=46).
    pub const HAS_PROPERTY: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(46),
    };

    /// HasComponent reference type (ns=0, i=47).
    pub const HAS_COMPONENT: NodeId = NodeId {
        namespace_index: 0,
        identifier: NodeIdentifier::Numeric(47),
    };

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns `true` if this is in the standard namespace (ns=0).
    #[inline]
    pub const fn is_standard(&self) -> bool {
        self.namespace_index == 0
    }

    /// Returns `true` if this is a null node ID (ns=0, i=0).
    #[inline]
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && matches!(self.identifier, NodeIdentifier::Numeric(0))
    }

    /// Returns the null node ID (ns=0, i=0).
    #[inline]
    pub const fn null() -> Self {
        Self {
            namespace_index: 0,
            identifier: NodeIdentifier::Numeric(0),
        }
    }

    /// Returns the numeric value if this is a numeric identifier.
    #[inline]
    pub fn as_numeric(&self) -> Option<u32> {
        match &self.identifier {
            NodeIdentifier::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value if this is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the numeric identifier of a namespace-0 node.
    ///
    /// Standard data types and reference types are addressed this way.
    #[inline]
    pub fn standard_numeric(&self) -> Option<u32> {
        if self.is_standard() {
            self.as_numeric()
        } else {
            None
        }
    }

    /// Converts to the OPC UA string format.
    ///
    /// Format: `ns=<namespace>;{i|s|g|b}=<identifier>`, with `ns=0;` omitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagpoll_opcua::types::NodeId;
    ///
    /// assert_eq!(NodeId::numeric(2, 1001).to_opc_string(), "ns=2;i=1001");
    /// assert_eq!(NodeId::numeric(0, 11).to_opc_string(), "i=11");
    /// ```
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            self.identifier.to_string()
        } else {
            format!("ns={};{}", self.namespace_index, self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses a NodeId from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;i=1001` (numeric)
    /// - `ns=2;s=MyNode` (string)
    /// - `ns=2;g=550e8400-e29b-41d4-a716-446655440000` (GUID)
    /// - `ns=2;b=SGVsbG8=` (opaque, base64 encoded)
    /// - `i=1001` (numeric, namespace 0)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace".into()))?;
                let ns: u16 = ns_str
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index".into()))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(
                id.parse()
                    .map_err(|_| invalid("Invalid numeric identifier".into()))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(invalid("Empty string identifier".into()));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(
                Uuid::parse_str(id).map_err(|e| invalid(format!("Invalid GUID: {}", e)))?,
            )
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            NodeIdentifier::Opaque(
                BASE64
                    .decode(id)
                    .map_err(|e| invalid(format!("Invalid base64: {}", e)))?,
            )
        } else {
            return Err(invalid(
                "Unknown identifier type. Expected i=, s=, g=, or b=".into(),
            ));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// NodeIdentifier
// =============================================================================

/// OPC UA node identifier types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),

    /// String identifier.
    String(String),

    /// GUID identifier.
    Guid(Uuid),

    /// Opaque identifier (application-specific byte array).
    Opaque(Vec<u8>),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// NodeClass
// =============================================================================

/// OPC UA node class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// Unspecified.
    Unspecified,
    /// Object node.
    Object,
    /// Variable node.
    Variable,
    /// Method node.
    Method,
    /// Object type node.
    ObjectType,
    /// Variable type node.
    VariableType,
    /// Reference type node.
    ReferenceType,
    /// Data type node.
    DataType,
    /// View node.
    View,
}

impl NodeClass {
    /// Returns the OPC UA enumeration value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Unspecified => 0,
            Self::Object => 1,
            Self::Variable => 2,
            Self::Method => 4,
            Self::ObjectType => 8,
            Self::VariableType => 16,
            Self::ReferenceType => 32,
            Self::DataType => 64,
            Self::View => 128,
        }
    }

    /// Creates from OPC UA value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Unspecified),
            1 => Some(Self::Object),
            2 => Some(Self::Variable),
            4 => Some(Self::Method),
            8 => Some(Self::ObjectType),
            16 => Some(Self::VariableType),
            32 => Some(Self::ReferenceType),
            64 => Some(Self::DataType),
            128 => Some(Self::View),
            _ => None,
        }
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unspecified => "Unspecified",
            Self::Object => "Object",
            Self::Variable => "Variable",
            Self::Method => "Method",
            Self::ObjectType => "ObjectType",
            Self::VariableType => "VariableType",
            Self::ReferenceType => "ReferenceType",
            Self::DataType => "DataType",
            Self::View => "View",
        }
    }
}

impl fmt::Display for NodeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// The OPC UA attributes the connector reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeId {
    /// Node class attribute.
    NodeClass,
    /// Browse name attribute.
    BrowseName,
    /// Description attribute.
    Description,
    /// Value attribute.
    Value,
    /// Data type attribute.
    DataType,
    /// Access level attribute.
    AccessLevel,
}

impl AttributeId {
    /// Returns the OPC UA numeric value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::NodeClass => 2,
            Self::BrowseName => 3,
            Self::Description => 5,
            Self::Value => 13,
            Self::DataType => 14,
            Self::AccessLevel => 17,
        }
    }

    /// Returns the attribute name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NodeClass => "NodeClass",
            Self::BrowseName => "BrowseName",
            Self::Description => "Description",
            Self::Value => "Value",
            Self::DataType => "DataType",
            Self::AccessLevel => "AccessLevel",
        }
    }
}

/// AccessLevel bit for CurrentWrite.
pub const ACCESS_LEVEL_CURRENT_WRITE: u8 = 0x02;

// =============================================================================
// SecurityMode
// =============================================================================

/// OPC UA message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Invalid or unspecified.
    Invalid,

    /// No security.
    #[default]
    None,

    /// Messages are signed but not encrypted.
    Sign,

    /// Messages are signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the OPC UA security mode value.
    pub const fn value(&self) -> u32 {
        match self {
            Self::Invalid => 0,
            Self::None => 1,
            Self::Sign => 2,
            Self::SignAndEncrypt => 3,
        }
    }

    /// Creates from OPC UA security mode value.
    pub fn from_value(value: u32) -> Self {
        match value {
            1 => Self::None,
            2 => Self::Sign,
            3 => Self::SignAndEncrypt,
            _ => Self::Invalid,
        }
    }

    /// Returns the display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Security policy URI of the `None` policy.
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// Returns the short name of a security policy URI (the fragment after `#`).
pub fn security_policy_name(uri: &str) -> &str {
    uri.rsplit_once('#').map_or(uri, |(_, name)| name)
}

// =============================================================================
// User tokens
// =============================================================================

/// User identity token kinds an endpoint can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTokenKind {
    /// Anonymous.
    Anonymous,
    /// Username and password.
    UserName,
    /// X.509 certificate.
    Certificate,
    /// Externally issued token.
    IssuedToken,
}

impl UserTokenKind {
    /// Creates from the OPC UA `UserTokenType` value.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Anonymous),
            1 => Some(Self::UserName),
            2 => Some(Self::Certificate),
            3 => Some(Self::IssuedToken),
            _ => None,
        }
    }

    /// Returns the type name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "Anonymous",
            Self::UserName => "UserName",
            Self::Certificate => "Certificate",
            Self::IssuedToken => "IssuedToken",
        }
    }
}

impl fmt::Display for UserTokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A user token policy advertised by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenPolicy {
    /// Server-assigned policy id, echoed back when activating the session.
    pub policy_id: String,
    /// Token kind.
    pub token_type: UserTokenKind,
    /// Issued token type URI, for issued tokens.
    pub issued_token_type: String,
    /// Issuer endpoint, for issued tokens.
    pub issuer_endpoint_url: String,
    /// Security policy protecting the token.
    pub security_policy_uri: String,
}

impl UserTokenPolicy {
    /// Creates a policy of the given kind with only the policy id set.
    pub fn new(policy_id: impl Into<String>, token_type: UserTokenKind) -> Self {
        Self {
            policy_id: policy_id.into(),
            token_type,
            issued_token_type: String::new(),
            issuer_endpoint_url: String::new(),
            security_policy_uri: String::new(),
        }
    }
}

// =============================================================================
// EndpointDescription
// =============================================================================

/// The application description of the server behind an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescription {
    /// Application URI.
    pub application_uri: String,
    /// Product URI.
    pub product_uri: String,
    /// Application name.
    pub application_name: String,
    /// Application type (Server, Client, ClientAndServer, DiscoveryServer).
    pub application_type: String,
    /// Gateway server URI.
    pub gateway_server_uri: String,
    /// Discovery profile URI.
    pub discovery_profile_uri: String,
    /// Discovery URLs.
    pub discovery_urls: Vec<String>,
}

/// A server-advertised connection option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescription {
    /// Endpoint URL.
    pub endpoint_url: String,
    /// Message security mode.
    pub security_mode: SecurityMode,
    /// Security policy URI.
    pub security_policy_uri: String,
    /// Relative security level; higher is more secure.
    pub security_level: u8,
    /// Accepted user identity token policies.
    pub user_identity_tokens: Vec<UserTokenPolicy>,
    /// Server application description.
    pub server: ServerDescription,
    /// Server certificate (DER), empty when not provided.
    #[serde(skip)]
    pub server_certificate: Vec<u8>,
    /// Transport profile URI.
    pub transport_profile_uri: String,
}

impl EndpointDescription {
    /// Creates an unsecured endpoint description.
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            security_mode: SecurityMode::None,
            security_policy_uri: SECURITY_POLICY_NONE_URI.to_string(),
            security_level: 0,
            user_identity_tokens: Vec::new(),
            server: ServerDescription::default(),
            server_certificate: Vec::new(),
            transport_profile_uri: String::new(),
        }
    }

    /// Sets the security mode, policy and level.
    pub fn with_security(
        mut self,
        mode: SecurityMode,
        policy_uri: impl Into<String>,
        level: u8,
    ) -> Self {
        self.security_mode = mode;
        self.security_policy_uri = policy_uri.into();
        self.security_level = level;
        self
    }

    /// Adds an accepted user token policy.
    pub fn with_token(mut self, policy: UserTokenPolicy) -> Self {
        self.user_identity_tokens.push(policy);
        self
    }

    /// Returns the first token policy of the given kind.
    pub fn token_policy(&self, kind: UserTokenKind) -> Option<&UserTokenPolicy> {
        self.user_identity_tokens
            .iter()
            .find(|policy| policy.token_type == kind)
    }

    /// Returns `true` if this endpoint accepts the given authentication mode.
    pub fn supports(&self, mode: AuthMode) -> bool {
        self.token_policy(mode.token_kind()).is_some()
    }

    /// Returns the short security policy name.
    pub fn security_policy_name(&self) -> &str {
        security_policy_name(&self.security_policy_uri)
    }
}

// =============================================================================
// AuthMode / UserIdentity
// =============================================================================

/// How the session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No user credentials.
    #[default]
    Anonymous,
    /// Username and password.
    UsernamePassword,
}

impl AuthMode {
    /// Derives the mode from configured credentials.
    ///
    /// Both non-empty selects username/password; anything else is anonymous.
    pub fn from_credentials(username: &str, password: &str) -> Self {
        if !username.is_empty() && !password.is_empty() {
            Self::UsernamePassword
        } else {
            Self::Anonymous
        }
    }

    /// Returns the token kind an endpoint must advertise for this mode.
    pub const fn token_kind(&self) -> UserTokenKind {
        match self {
            Self::Anonymous => UserTokenKind::Anonymous,
            Self::UsernamePassword => UserTokenKind::UserName,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token_kind().name())
    }
}

/// The user identity presented when activating a session.
#[derive(Clone, PartialEq, Eq)]
pub enum UserIdentity {
    /// Anonymous marker.
    Anonymous,
    /// Username and password.
    UserName {
        /// The username.
        username: String,
        /// The password.
        password: String,
    },
}

impl UserIdentity {
    /// Returns the authentication mode of this identity.
    pub fn auth_mode(&self) -> AuthMode {
        match self {
            Self::Anonymous => AuthMode::Anonymous,
            Self::UserName { .. } => AuthMode::UsernamePassword,
        }
    }
}

impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::UserName { username, .. } => f
                .debug_struct("UserName")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

// =============================================================================
// ConnectorConfig
// =============================================================================

/// Everything the core needs to connect, browse and poll.
///
/// Built with [`ConnectorConfig::builder`]; `build()` parses the root node ids
/// and validates the endpoint, so an invalid configuration never reaches the
/// network.
#[derive(Clone)]
pub struct ConnectorConfig {
    /// Server discovery address (`opc.tcp://`).
    pub endpoint: String,
    /// Username; empty for anonymous.
    pub username: String,
    /// Password; empty for anonymous.
    pub password: String,
    /// Browse roots.
    pub root_node_ids: Vec<NodeId>,
    /// Client application name.
    pub application_name: String,
    /// Hint embedded in the client certificate URI.
    pub identity_hint: String,
    /// Requested session timeout.
    pub session_timeout: Duration,
    /// Skip nodes already visited during a browse.
    pub dedupe_visited: bool,
}

impl ConnectorConfig {
    /// Creates a new builder.
    pub fn builder() -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::default()
    }

    /// Returns the authentication mode implied by the credentials.
    pub fn auth_mode(&self) -> AuthMode {
        AuthMode::from_credentials(&self.username, &self.password)
    }

    /// Returns the user identity implied by the credentials.
    pub fn user_identity(&self) -> UserIdentity {
        match self.auth_mode() {
            AuthMode::Anonymous => UserIdentity::Anonymous,
            AuthMode::UsernamePassword => UserIdentity::UserName {
                username: self.username.clone(),
                password: self.password.clone(),
            },
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), OpcUaError> {
        validate_endpoint(&self.endpoint)?;

        if self.root_node_ids.is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::NoRootNodes));
        }

        Ok(())
    }
}

impl fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("root_node_ids", &self.root_node_ids)
            .field("application_name", &self.application_name)
            .field("identity_hint", &self.identity_hint)
            .field("session_timeout", &self.session_timeout)
            .field("dedupe_visited", &self.dedupe_visited)
            .finish()
    }
}

/// Checks that `endpoint` is a non-empty `opc.tcp://` URL with a host.
pub fn validate_endpoint(endpoint: &str) -> Result<(), OpcUaError> {
    if endpoint.is_empty() {
        return Err(OpcUaError::configuration(ConfigurationError::missing_field(
            "endpoint",
        )));
    }

    match endpoint.strip_prefix("opc.tcp://") {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        Some(_) => Err(OpcUaError::configuration(
            ConfigurationError::invalid_endpoint(endpoint, "Endpoint has no host"),
        )),
        None => Err(OpcUaError::configuration(
            ConfigurationError::invalid_endpoint(endpoint, "Endpoint must start with opc.tcp://"),
        )),
    }
}

fn default_application_name() -> String {
    "tagpoll".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Builder for [`ConnectorConfig`].
#[derive(Debug, Default)]
pub struct ConnectorConfigBuilder {
    endpoint: Option<String>,
    username: Option<String>,
    password: Option<String>,
    root_node_ids: Vec<String>,
    application_name: Option<String>,
    identity_hint: Option<String>,
    session_timeout: Option<Duration>,
    dedupe_visited: bool,
}

impl ConnectorConfigBuilder {
    /// Sets the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Adds a browse root in text form.
    pub fn root_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.root_node_ids.push(node_id.into());
        self
    }

    /// Adds several browse roots in text form.
    pub fn root_node_ids<I, S>(mut self, node_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_node_ids.extend(node_ids.into_iter().map(Into::into));
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the certificate URI hint.
    pub fn identity_hint(mut self, hint: impl Into<String>) -> Self {
        self.identity_hint = Some(hint.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Enables visited-node deduplication during browse.
    pub fn dedupe_visited(mut self, enabled: bool) -> Self {
        self.dedupe_visited = enabled;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<ConnectorConfig, OpcUaError> {
        let endpoint = self.endpoint.ok_or_else(|| {
            OpcUaError::configuration(ConfigurationError::missing_field("endpoint"))
        })?;

        let root_node_ids = self
            .root_node_ids
            .iter()
            .map(|s| s.parse::<NodeId>())
            .collect::<Result<Vec<_>, _>>()?;

        let application_name = self
            .application_name
            .unwrap_or_else(default_application_name);

        let config = ConnectorConfig {
            endpoint,
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            root_node_ids,
            identity_hint: self
                .identity_hint
                .unwrap_or_else(|| application_name.clone()),
            application_name,
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
            dedupe_visited: self.dedupe_visited,
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Tests
// =============================================================================
