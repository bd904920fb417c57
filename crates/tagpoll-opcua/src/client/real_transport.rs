// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport backed by the `opcua` crate.
//!
//! The crate's client API is synchronous, so every call runs on a blocking
//! worker thread. The ephemeral client identity is staged into a temporary
//! PKI directory that lives exactly as long as the session.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagpoll_opcua::client::RealOpcUaTransport;
//! use tagpoll_opcua::TagPollDriver;
//!
//! let driver = TagPollDriver::new(config, Arc::new(RealOpcUaTransport::new()));
//! driver.connect(&cancel).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use opcua::client::prelude::{
    AttributeService, Client, ClientBuilder, IdentityToken, Session, ViewService,
};
use opcua::sync::RwLock as OpcUaRwLock;
use opcua::types as ua;

use crate::certificate::EphemeralPki;
use crate::client::transport::{
    DataValue, OpcUaValue, ReadValueId, ReferenceDescription, SessionOptions, UaSession,
    UaTransport,
};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, OperationError, SessionError};
use crate::status;
use crate::types::{
    EndpointDescription, NodeClass, NodeId, NodeIdentifier, SecurityMode, ServerDescription,
    UserIdentity, UserTokenKind, UserTokenPolicy,
};

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// Transport using the `opcua` crate's synchronous client.
#[derive(Debug, Clone, Default)]
pub struct RealOpcUaTransport {
    _private: (),
}

impl RealOpcUaTransport {
    /// Creates a new transport.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs a blocking closure on the blocking thread pool.
async fn blocking<T, F>(operation: &'static str, f: F) -> OpcUaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OpcUaResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OpcUaError::operation(OperationError::worker_failed(operation, e.to_string())))?
}

fn discovery_client() -> OpcUaResult<Client> {
    ClientBuilder::new()
        .application_name("tagpoll discovery")
        .application_uri("urn:tagpoll:discovery")
        .create_sample_keypair(false)
        .trust_server_certs(true)
        .session_retry_limit(0)
        .client()
        .ok_or_else(|| {
            OpcUaError::session(SessionError::creation_failed(
                "invalid discovery client configuration",
                None,
            ))
        })
}

fn fetch_endpoints(client: &Client, url: &str) -> OpcUaResult<Vec<ua::EndpointDescription>> {
    client.get_server_endpoints_from_url(url).map_err(|code| {
        OpcUaError::connection(ConnectionError::discovery_failed(
            url,
            code.to_string(),
            Some(code.bits()),
        ))
    })
}

#[async_trait]
impl UaTransport for RealOpcUaTransport {
    async fn discover_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        let url = url.to_string();
        blocking("discover", move || {
            let client = discovery_client()?;
            let endpoints = fetch_endpoints(&client, &url)?;
            trace!(endpoint = %url, count = endpoints.len(), "GetEndpoints returned");
            Ok(endpoints.iter().map(from_ua_endpoint).collect())
        })
        .await
    }

    async fn open_session(&self, options: SessionOptions) -> OpcUaResult<Arc<dyn UaSession>> {
        let pki = EphemeralPki::stage(&options.client_identity)?;

        let session = blocking("open_session", move || {
            let mut client = ClientBuilder::new()
                .application_name(options.application_name.as_str())
                .application_uri(options.client_identity.application_uri.as_str())
                .pki_dir(pki.pki_dir())
                .certificate_path(pki.certificate_path())
                .private_key_path(pki.private_key_path())
                .create_sample_keypair(false)
                .trust_server_certs(true)
                .session_retry_limit(0)
                .session_timeout(duration_millis_u32(options.session_timeout))
                .client()
                .ok_or_else(|| {
                    OpcUaError::session(SessionError::creation_failed(
                        "invalid client configuration",
                        None,
                    ))
                })?;

            // The stack resolves the endpoint against its own discovery result.
            let wanted = &options.endpoint;
            let endpoint = fetch_endpoints(&client, &wanted.endpoint_url)?
                .into_iter()
                .find(|candidate| {
                    candidate.endpoint_url.as_ref() == wanted.endpoint_url
                        && candidate.security_policy_uri.as_ref() == wanted.security_policy_uri
                        && candidate.security_mode == to_ua_security_mode(wanted.security_mode)
                })
                .ok_or_else(|| {
                    OpcUaError::connection(ConnectionError::no_suitable_endpoint(
                        &wanted.endpoint_url,
                        options.identity.auth_mode().to_string(),
                    ))
                })?;

            debug!(
                endpoint = %wanted.endpoint_url,
                security_policy = %wanted.security_policy_uri,
                user_token_policy = %options.user_token_policy_id,
                "Opening session"
            );

            let session = client
                .connect_to_endpoint(endpoint, identity_token(&options.identity))
                .map_err(|code| {
                    OpcUaError::session(SessionError::creation_failed(
                        code.to_string(),
                        Some(code.bits()),
                    ))
                })?;

            Ok(RealOpcUaSession::new(session, wanted.endpoint_url.clone(), pki))
        })
        .await?;

        Ok(Arc::new(session))
    }

    fn display_name(&self) -> String {
        "opcua".to_string()
    }
}

fn identity_token(identity: &UserIdentity) -> IdentityToken {
    match identity {
        UserIdentity::Anonymous => IdentityToken::Anonymous,
        UserIdentity::UserName { username, password } => {
            IdentityToken::UserName(username.clone(), password.clone())
        }
    }
}

fn duration_millis_u32(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

// =============================================================================
// RealOpcUaSession
// =============================================================================

/// A connected `opcua` session and the PKI directory it was opened with.
///
/// The `opcua` session owns a tokio runtime of its own, which must not be
/// dropped on an async worker thread. The last handle is therefore always
/// released on the blocking pool, see the `Drop` impl.
struct RealOpcUaSession {
    session: Option<Arc<OpcUaRwLock<Session>>>,
    endpoint_url: String,
    _pki: EphemeralPki,
}

impl RealOpcUaSession {
    fn new(session: Arc<OpcUaRwLock<Session>>, endpoint_url: String, pki: EphemeralPki) -> Self {
        Self {
            session: Some(session),
            endpoint_url,
            _pki: pki,
        }
    }

    fn handle(&self) -> OpcUaResult<Arc<OpcUaRwLock<Session>>> {
        self.session.clone().ok_or_else(OpcUaError::not_connected)
    }
}

impl Drop for RealOpcUaSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(session));
            }
            Err(_) => drop(session),
        }
    }
}

#[async_trait]
impl UaSession for RealOpcUaSession {
    async fn read(&self, items: &[ReadValueId], max_age: Duration) -> OpcUaResult<Vec<DataValue>> {
        let session = self.handle()?;
        let request: Vec<ua::ReadValueId> = items.iter().map(to_ua_read_value_id).collect();
        let max_age = max_age.as_secs_f64() * 1000.0;

        blocking("read", move || {
            let results = session
                .read()
                .read(&request, ua::TimestampsToReturn::Both, max_age)
                .map_err(|code| OpcUaError::service_fault("Read", code.bits()))?;
            Ok(results.iter().map(from_ua_data_value).collect())
        })
        .await
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        reference_type: &NodeId,
    ) -> OpcUaResult<Vec<ReferenceDescription>> {
        let session = self.handle()?;
        let description = ua::BrowseDescription {
            node_id: to_ua_node_id(node_id),
            browse_direction: ua::BrowseDirection::Forward,
            reference_type_id: to_ua_node_id(reference_type),
            include_subtypes: true,
            node_class_mask: 0,
            result_mask: ua::BrowseDescriptionResultMask::all().bits(),
        };

        blocking("browse", move || {
            let results = session
                .read()
                .browse(&[description])
                .map_err(|code| OpcUaError::service_fault("Browse", code.bits()))?
                .unwrap_or_default();

            let Some(result) = results.into_iter().next() else {
                return Ok(Vec::new());
            };
            if result.status_code.is_bad() {
                return Err(OpcUaError::service_fault("Browse", result.status_code.bits()));
            }

            Ok(result
                .references
                .unwrap_or_default()
                .iter()
                .map(|r| ReferenceDescription {
                    node_id: from_ua_node_id(&r.node_id.node_id),
                    browse_name: r.browse_name.name.as_ref().to_string(),
                    node_class: NodeClass::from_value(r.node_class as u32)
                        .unwrap_or(NodeClass::Unspecified),
                })
                .collect())
        })
        .await
    }

    async fn close(&self) -> OpcUaResult<()> {
        let session = self.handle()?;
        blocking("close", move || {
            session.read().disconnect();
            Ok(())
        })
        .await
    }

    fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_ua_security_mode(mode: SecurityMode) -> ua::MessageSecurityMode {
    match mode {
        SecurityMode::Invalid => ua::MessageSecurityMode::Invalid,
        SecurityMode::None => ua::MessageSecurityMode::None,
        SecurityMode::Sign => ua::MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => ua::MessageSecurityMode::SignAndEncrypt,
    }
}

fn from_ua_endpoint(endpoint: &ua::EndpointDescription) -> EndpointDescription {
    let server = &endpoint.server;
    EndpointDescription {
        endpoint_url: endpoint.endpoint_url.as_ref().to_string(),
        security_mode: SecurityMode::from_value(endpoint.security_mode as u32),
        security_policy_uri: endpoint.security_policy_uri.as_ref().to_string(),
        security_level: endpoint.security_level,
        user_identity_tokens: endpoint
            .user_identity_tokens
            .iter()
            .flatten()
            .filter_map(|token| {
                let kind = UserTokenKind::from_value(token.token_type as u32)?;
                Some(UserTokenPolicy {
                    policy_id: token.policy_id.as_ref().to_string(),
                    token_type: kind,
                    issued_token_type: token.issued_token_type.as_ref().to_string(),
                    issuer_endpoint_url: token.issuer_endpoint_url.as_ref().to_string(),
                    security_policy_uri: token.security_policy_uri.as_ref().to_string(),
                })
            })
            .collect(),
        server: ServerDescription {
            application_uri: server.application_uri.as_ref().to_string(),
            product_uri: server.product_uri.as_ref().to_string(),
            application_name: server.application_name.text.as_ref().to_string(),
            application_type: format!("{:?}", server.application_type),
            gateway_server_uri: server.gateway_server_uri.as_ref().to_string(),
            discovery_profile_uri: server.discovery_profile_uri.as_ref().to_string(),
            discovery_urls: server
                .discovery_urls
                .iter()
                .flatten()
                .map(|url| url.as_ref().to_string())
                .collect(),
        },
        server_certificate: endpoint.server_certificate.value.clone().unwrap_or_default(),
        transport_profile_uri: endpoint.transport_profile_uri.as_ref().to_string(),
    }
}

fn to_ua_read_value_id(item: &ReadValueId) -> ua::ReadValueId {
    ua::ReadValueId {
        node_id: to_ua_node_id(&item.node_id),
        attribute_id: item.attribute.value(),
        index_range: ua::UAString::null(),
        data_encoding: ua::QualifiedName::null(),
    }
}

fn to_ua_node_id(node_id: &NodeId) -> ua::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => ua::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => ua::NodeId::new(ns, v.clone()),
        NodeIdentifier::Guid(v) => ua::NodeId::new(ns, ua::Guid::from(*v)),
        NodeIdentifier::Opaque(v) => ua::NodeId::new(ns, ua::ByteString::from(v.as_slice())),
    }
}

fn from_ua_node_id(node_id: &ua::NodeId) -> NodeId {
    let ns = node_id.namespace;
    match &node_id.identifier {
        ua::Identifier::Numeric(v) => NodeId::numeric(ns, *v),
        ua::Identifier::String(v) => NodeId::string(ns, v.as_ref()),
        ua::Identifier::Guid(v) => NodeId::guid(ns, uuid::Uuid::from_bytes(*v.as_bytes())),
        ua::Identifier::ByteString(v) => NodeId::opaque(ns, v.value.clone().unwrap_or_default()),
    }
}

fn from_ua_data_value(value: &ua::DataValue) -> DataValue {
    DataValue {
        value: value.value.as_ref().map(from_ua_variant),
        status_code: value.status.as_ref().map_or(status::GOOD, |s| s.bits()),
        source_timestamp: value.source_timestamp.as_ref().map(|t| t.as_chrono()),
        server_timestamp: value.server_timestamp.as_ref().map(|t| t.as_chrono()),
    }
}

fn from_ua_variant(variant: &ua::Variant) -> OpcUaValue {
    use ua::Variant;

    match variant {
        Variant::Empty => OpcUaValue::Null,
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::SByte(v) => OpcUaValue::SByte(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::UInt64(v) => OpcUaValue::UInt64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => OpcUaValue::DateTime(v.as_chrono()),
        Variant::Guid(v) => OpcUaValue::Guid(uuid::Uuid::from_bytes(*v.as_bytes())),
        Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::NodeId(v) => OpcUaValue::NodeId(from_ua_node_id(v)),
        Variant::QualifiedName(v) => OpcUaValue::QualifiedName {
            namespace_index: v.namespace_index,
            name: v.name.as_ref().to_string(),
        },
        Variant::LocalizedText(v) => OpcUaValue::LocalizedText(v.text.as_ref().to_string()),
        Variant::Array(array) => {
            OpcUaValue::Array(array.values.iter().map(from_ua_variant).collect())
        }
        Variant::StatusCode(_) => OpcUaValue::Other("StatusCode".into()),
        Variant::XmlElement(_) => OpcUaValue::Other("XmlElement".into()),
        Variant::ExpandedNodeId(_) => OpcUaValue::Other("ExpandedNodeId".into()),
        Variant::ExtensionObject(_) => OpcUaValue::Other("ExtensionObject".into()),
        _ => OpcUaValue::Other("Variant".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use opcua::client::prelude::SecurityPolicy;

    use crate::certificate::ClientIdentity;

    const OFFLINE_ENDPOINT: &str = "opc.tcp://127.0.0.1:4840";

    /// Builds an unconnected session, the way `open_session` does, without a server.
    async fn offline_session() -> RealOpcUaSession {
        let identity = ClientIdentity {
            certificate_der: vec![0x30, 0x00],
            private_key_pem: String::new(),
            application_uri: "urn:tagpoll:client-offline0".into(),
            common_name: "tagpoll".into(),
            not_before: Utc::now(),
            not_after: Utc::now(),
        };
        let pki = EphemeralPki::stage(&identity).unwrap();
        let pki_dir = pki.pki_dir().to_path_buf();

        let session = tokio::task::spawn_blocking(move || {
            let mut client = ClientBuilder::new()
                .application_name("tagpoll offline")
                .application_uri("urn:tagpoll:client-offline0")
                .pki_dir(pki_dir)
                .create_sample_keypair(false)
                .trust_server_certs(true)
                .session_retry_limit(0)
                .client()
                .unwrap();
            let endpoint: ua::EndpointDescription = (
                OFFLINE_ENDPOINT,
                SecurityPolicy::None.to_uri(),
                ua::MessageSecurityMode::None,
                ua::UserTokenPolicy::anonymous(),
            )
                .into();
            client
                .new_session_from_info((endpoint, IdentityToken::Anonymous))
                .unwrap()
        })
        .await
        .unwrap();

        RealOpcUaSession::new(session, OFFLINE_ENDPOINT.to_string(), pki)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_session_close_and_drop_on_async_worker() {
        let session: Arc<dyn UaSession> = Arc::new(offline_session().await);
        assert_eq!(session.endpoint_url(), OFFLINE_ENDPOINT);

        session.close().await.unwrap();
        drop(session);
    }

    #[tokio::test]
    async fn test_session_dropped_without_close() {
        let session: Arc<dyn UaSession> = Arc::new(offline_session().await);
        let clone = session.clone();
        drop(session);
        drop(clone);
    }

    #[test]
    fn test_node_id_conversion() {
        for node in [
            NodeId::numeric(2, 1001),
            NodeId::string(2, "Line1.Temp"),
            NodeId::numeric(0, 85),
        ] {
            assert_eq!(from_ua_node_id(&to_ua_node_id(&node)), node);
        }
    }

    #[test]
    fn test_variant_conversion() {
        assert_eq!(from_ua_variant(&ua::Variant::Int32(42)), OpcUaValue::Int32(42));
        assert_eq!(from_ua_variant(&ua::Variant::Empty), OpcUaValue::Null);
        assert_eq!(
            from_ua_variant(&ua::Variant::from("run")),
            OpcUaValue::String("run".into())
        );
    }

    #[test]
    fn test_security_mode_mapping() {
        assert_eq!(
            to_ua_security_mode(SecurityMode::SignAndEncrypt),
            ua::MessageSecurityMode::SignAndEncrypt
        );
        assert_eq!(duration_millis_u32(Duration::from_secs(60)), 60_000);
    }
}
