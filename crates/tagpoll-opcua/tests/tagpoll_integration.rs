// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! End-to-end tests of the connector against an in-memory address space.
//!
//! The live test at the bottom needs a reachable server and the
//! `real-transport` feature:
//!
//! - `OPCUA_TEST_ENDPOINT`: endpoint URL (e.g. `opc.tcp://localhost:4840`)
//! - `OPCUA_TEST_NODE_ID`: browse root (defaults to the Objects folder)
//!
//! ```text
//! OPCUA_TEST_ENDPOINT=opc.tcp://localhost:4840 \
//!     cargo test -p tagpoll-opcua --features real-transport -- --ignored
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use tagpoll_opcua::client::{
    DataValue, OpcUaValue, ReadValueId, ReferenceDescription, SessionOptions,
};
use tagpoll_opcua::status;
use tagpoll_opcua::types::{
    AttributeId, NodeClass, SecurityMode, UserIdentity, UserTokenKind, UserTokenPolicy,
};
use tagpoll_opcua::{
    ClientIdentity, ConfigurationError, ConnectStep, ConnectionError, ConnectorConfig,
    EndpointDescription, IdentityProvider, NodeId, OpcUaError, OpcUaResult, SessionError,
    SessionState, TagPollDriver, UaSession, UaTransport, MAX_BROWSE_DEPTH,
};

const ENDPOINT: &str = "opc.tcp://memory:4840";
const BASIC256SHA256: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";

// =============================================================================
// In-memory server
// =============================================================================

struct Node {
    class: NodeClass,
    name: String,
    data_type: Option<u32>,
    value: OpcUaValue,
}

#[derive(Default)]
struct AddressSpace {
    nodes: HashMap<NodeId, Node>,
    references: HashMap<(NodeId, NodeId), Vec<NodeId>>,
}

impl AddressSpace {
    fn object(mut self, id: &str, name: &str) -> Self {
        self.nodes.insert(
            node(id),
            Node {
                class: NodeClass::Object,
                name: name.into(),
                data_type: None,
                value: OpcUaValue::Null,
            },
        );
        self
    }

    fn variable(mut self, id: &str, name: &str, data_type: u32, value: OpcUaValue) -> Self {
        self.nodes.insert(
            node(id),
            Node {
                class: NodeClass::Variable,
                name: name.into(),
                data_type: Some(data_type),
                value,
            },
        );
        self
    }

    fn reference(mut self, from: &str, reference_type: NodeId, to: &str) -> Self {
        self.references
            .entry((node(from), reference_type))
            .or_default()
            .push(node(to));
        self
    }

    fn attribute(&self, item: &ReadValueId) -> DataValue {
        let Some(n) = self.nodes.get(&item.node_id) else {
            return DataValue::bad(status::BAD_NODE_ID_UNKNOWN);
        };
        match item.attribute {
            AttributeId::NodeClass => DataValue::good(OpcUaValue::Int32(n.class.value() as i32)),
            AttributeId::BrowseName => DataValue::good(OpcUaValue::QualifiedName {
                namespace_index: 2,
                name: n.name.clone(),
            }),
            AttributeId::Description => DataValue::good(OpcUaValue::LocalizedText(String::new())),
            AttributeId::AccessLevel if n.class == NodeClass::Variable => {
                DataValue::good(OpcUaValue::Byte(0x03))
            }
            AttributeId::DataType => match n.data_type {
                Some(id) => DataValue::good(OpcUaValue::NodeId(NodeId::numeric(0, id))),
                None => DataValue::bad(status::BAD_ATTRIBUTE_ID_INVALID),
            },
            AttributeId::AccessLevel => DataValue::bad(status::BAD_ATTRIBUTE_ID_INVALID),
            AttributeId::Value => {
                let now = Utc::now();
                DataValue::good(n.value.clone()).with_timestamps(now, now)
            }
        }
    }
}

fn node(id: &str) -> NodeId {
    NodeId::string(2, id)
}

/// Line1 ─HasComponent─▶ Speed (Int32 = 42)
///       ─Organizes───▶ Valve ─HasComponent─▶ Open (Boolean = true)
fn line() -> AddressSpace {
    AddressSpace::default()
        .object("Line1", "Line1")
        .variable("Speed", "Speed", 6, OpcUaValue::Int32(42))
        .object("Valve", "Valve")
        .variable("Open", "Open", 1, OpcUaValue::Boolean(true))
        .reference("Line1", NodeId::HAS_COMPONENT, "Speed")
        .reference("Line1", NodeId::ORGANIZES, "Valve")
        .reference("Valve", NodeId::HAS_COMPONENT, "Open")
}

struct MockSession {
    space: Arc<AddressSpace>,
    read_faults: Mutex<VecDeque<u32>>,
    browse_delay: Option<Duration>,
    value_reads: AtomicUsize,
    closes: AtomicUsize,
}

impl MockSession {
    fn fail_next_read(&self, status_code: u32) {
        self.read_faults.lock().unwrap().push_back(status_code);
    }
}

#[async_trait]
impl UaSession for MockSession {
    async fn read(&self, items: &[ReadValueId], _max_age: Duration) -> OpcUaResult<Vec<DataValue>> {
        if items.iter().all(|item| item.attribute == AttributeId::Value) {
            self.value_reads.fetch_add(1, Ordering::SeqCst);
            if let Some(code) = self.read_faults.lock().unwrap().pop_front() {
                return Err(OpcUaError::service_fault("Read", code));
            }
        }
        Ok(items.iter().map(|item| self.space.attribute(item)).collect())
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        reference_type: &NodeId,
    ) -> OpcUaResult<Vec<ReferenceDescription>> {
        if let Some(delay) = self.browse_delay {
            tokio::time::sleep(delay).await;
        }
        let targets = self
            .space
            .references
            .get(&(node_id.clone(), reference_type.clone()))
            .cloned()
            .unwrap_or_default();
        Ok(targets
            .into_iter()
            .map(|id| {
                let n = &self.space.nodes[&id];
                ReferenceDescription {
                    browse_name: n.name.clone(),
                    node_class: n.class,
                    node_id: id,
                }
            })
            .collect())
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn endpoint_url(&self) -> &str {
        ENDPOINT
    }
}

struct MockTransport {
    space: Arc<AddressSpace>,
    endpoints: Vec<EndpointDescription>,
    browse_delay: Option<Duration>,
    discover_calls: AtomicUsize,
    opened: Mutex<Vec<SessionOptions>>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockTransport {
    fn new(space: AddressSpace) -> Self {
        Self {
            space: Arc::new(space),
            endpoints: vec![anonymous_endpoint()],
            browse_delay: None,
            discover_calls: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    fn with_endpoints(mut self, endpoints: Vec<EndpointDescription>) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn with_browse_delay(mut self, delay: Duration) -> Self {
        self.browse_delay = Some(delay);
        self
    }

    fn last_session(&self) -> Arc<MockSession> {
        self.sessions.lock().unwrap().last().cloned().unwrap()
    }

    fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl UaTransport for MockTransport {
    async fn discover_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
        assert_eq!(url, ENDPOINT);
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoints.clone())
    }

    async fn open_session(&self, options: SessionOptions) -> OpcUaResult<Arc<dyn UaSession>> {
        self.opened.lock().unwrap().push(options);
        let session = Arc::new(MockSession {
            space: self.space.clone(),
            read_faults: Mutex::new(VecDeque::new()),
            browse_delay: self.browse_delay,
            value_reads: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        });
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    fn display_name(&self) -> String {
        "memory".into()
    }
}

struct FixedIdentity;

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn provision(&self, hint: &str) -> OpcUaResult<ClientIdentity> {
        Ok(ClientIdentity {
            certificate_der: vec![0x30, 0x00],
            private_key_pem: String::new(),
            application_uri: format!("urn:{}:client-fixed", hint),
            common_name: hint.into(),
            not_before: Utc::now(),
            not_after: Utc::now() + chrono::Duration::days(365),
        })
    }
}

fn anonymous_endpoint() -> EndpointDescription {
    EndpointDescription::new(ENDPOINT)
        .with_token(UserTokenPolicy::new("anonymous", UserTokenKind::Anonymous))
}

fn config(roots: &[&str]) -> ConnectorConfig {
    ConnectorConfig::builder()
        .endpoint(ENDPOINT)
        .root_node_ids(roots.iter().copied())
        .build()
        .unwrap()
}

fn driver(config: ConnectorConfig, transport: &Arc<MockTransport>) -> TagPollDriver {
    TagPollDriver::with_identity_provider(config, transport.clone(), Arc::new(FixedIdentity))
        .with_poll_interval(Duration::from_millis(10))
}

// =============================================================================
// Browse and poll
// =============================================================================

#[tokio::test]
async fn test_connect_browse_and_read() {
    let transport = Arc::new(MockTransport::new(line()));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);
    let cancel = CancellationToken::new();

    driver.connect(&cancel).await.unwrap();
    assert!(driver.is_connected());
    assert_eq!(driver.session_manager().state(), SessionState::Connected);

    let tags = driver.tags().await.unwrap();
    let described: Vec<(&str, &str)> = tags
        .iter()
        .map(|t| (t.path.as_str(), t.data_type.as_str()))
        .collect();
    assert_eq!(described, vec![("Speed", "int32"), ("Valve.Open", "bool")]);
    assert!(tags.iter().all(|t| t.writable));

    let readings = driver.read_batch(&cancel).await.unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].payload, "42");
    assert_eq!(readings[0].opcua_path, "ns_2_s_Speed");
    assert_eq!(readings[0].path, "Speed");
    assert_eq!(readings[1].payload, "true");
    assert_eq!(readings[1].opcua_path, "ns_2_s_Open");
    assert!(readings.iter().all(|r| r.source_timestamp.is_some()));
    assert_eq!(readings[1].metadata(), [("opcua_path", "ns_2_s_Open")]);

    driver.close(&cancel).await.unwrap();
    assert!(!driver.is_connected());
    assert!(driver.tags().await.is_none());
    assert_eq!(transport.last_session().closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_connect_is_noop() {
    let transport = Arc::new(MockTransport::new(line()));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);
    let cancel = CancellationToken::new();

    driver.connect(&cancel).await.unwrap();
    driver.connect(&cancel).await.unwrap();

    assert_eq!(transport.discover_calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.session_count(), 1);
}

#[tokio::test]
async fn test_multiple_roots_keep_order() {
    let space = line()
        .object("Line2", "Line2")
        .variable("Temp", "Temp", 11, OpcUaValue::Double(21.5))
        .reference("Line2", NodeId::HAS_PROPERTY, "Temp");
    let transport = Arc::new(MockTransport::new(space));
    let driver = driver(config(&["ns=2;s=Line2", "ns=2;s=Line1"]), &transport);
    let cancel = CancellationToken::new();

    driver.connect(&cancel).await.unwrap();
    let readings = driver.read_batch(&cancel).await.unwrap();
    let payloads: Vec<&str> = readings.iter().map(|r| r.payload.as_str()).collect();
    assert_eq!(payloads, vec!["21.5", "42", "true"]);
}

#[tokio::test]
async fn test_cyclic_tree_is_depth_bounded() {
    let space = AddressSpace::default()
        .object("Loop", "Loop")
        .variable("V", "V", 7, OpcUaValue::UInt32(7))
        .reference("Loop", NodeId::ORGANIZES, "Loop")
        .reference("Loop", NodeId::HAS_COMPONENT, "V");
    let transport = Arc::new(MockTransport::new(space));
    let driver = driver(config(&["ns=2;s=Loop"]), &transport);

    driver.connect(&CancellationToken::new()).await.unwrap();

    let tags = driver.tags().await.unwrap();
    assert_eq!(tags.len(), MAX_BROWSE_DEPTH);
    let deepest = tags.iter().map(|t| t.path.split('.').count()).max().unwrap();
    assert_eq!(deepest, MAX_BROWSE_DEPTH);
}

#[tokio::test]
async fn test_unknown_value_type_is_skipped() {
    let space = line()
        .variable("Stamp", "Stamp", 13, OpcUaValue::DateTime(Utc::now()))
        .reference("Line1", NodeId::HAS_COMPONENT, "Stamp");
    let transport = Arc::new(MockTransport::new(space));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);
    let cancel = CancellationToken::new();

    driver.connect(&cancel).await.unwrap();
    assert_eq!(driver.tags().await.unwrap().len(), 3);

    let readings = driver.read_batch(&cancel).await.unwrap();
    assert_eq!(readings.len(), 2);
    assert!(readings.iter().all(|r| r.path != "Stamp"));
    assert_eq!(driver.poll_loop().stats().skipped(), 1);
}

// =============================================================================
// Failure classification
// =============================================================================

#[tokio::test]
async fn test_fatal_status_requires_reconnect() {
    for code in status::SESSION_FATAL {
        let transport = Arc::new(MockTransport::new(line()));
        let driver = driver(config(&["ns=2;s=Line1"]), &transport);
        let cancel = CancellationToken::new();

        driver.connect(&cancel).await.unwrap();
        transport.last_session().fail_next_read(code);

        let err = driver.read_batch(&cancel).await.unwrap_err();
        assert!(
            matches!(err, OpcUaError::Session(SessionError::Lost { status_code, .. }) if status_code == code),
            "unexpected error for {:#010x}: {}",
            code,
            err
        );
        assert!(err.requires_reconnect());
        assert!(!driver.is_connected());
        assert!(driver.tags().await.is_none());
        assert_eq!(transport.last_session().closes.load(Ordering::SeqCst), 1);

        driver.connect(&cancel).await.unwrap();
        assert_eq!(transport.session_count(), 2);
        assert_eq!(driver.read_batch(&cancel).await.unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_non_fatal_status_keeps_session() {
    let transport = Arc::new(MockTransport::new(line()));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);
    let cancel = CancellationToken::new();

    driver.connect(&cancel).await.unwrap();
    transport
        .last_session()
        .fail_next_read(status::BAD_TOO_MANY_OPERATIONS);

    let err = driver.read_batch(&cancel).await.unwrap_err();
    assert_eq!(err.status_code(), Some(status::BAD_TOO_MANY_OPERATIONS));
    assert!(!err.requires_reconnect());
    assert!(driver.is_connected());

    assert_eq!(driver.read_batch(&cancel).await.unwrap().len(), 2);
    assert_eq!(transport.session_count(), 1);
    assert_eq!(transport.last_session().closes.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Connect sequence
// =============================================================================

#[tokio::test]
async fn test_zero_roots_rejected_before_network() {
    let err = ConnectorConfig::builder()
        .endpoint(ENDPOINT)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        OpcUaError::Configuration(ConfigurationError::NoRootNodes)
    ));

    let err = ConnectorConfig::builder()
        .endpoint(ENDPOINT)
        .root_node_id("not-a-node")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        OpcUaError::Configuration(ConfigurationError::InvalidNodeId { .. })
    ));
}

#[tokio::test]
async fn test_credentials_select_username_endpoint() {
    let endpoints = vec![
        anonymous_endpoint().with_security(SecurityMode::SignAndEncrypt, BASIC256SHA256, 200),
        EndpointDescription::new(ENDPOINT)
            .with_security(SecurityMode::Sign, BASIC256SHA256, 50)
            .with_token(UserTokenPolicy::new("user", UserTokenKind::UserName)),
        anonymous_endpoint(),
    ];
    let transport = Arc::new(MockTransport::new(line()).with_endpoints(endpoints));
    let config = ConnectorConfig::builder()
        .endpoint(ENDPOINT)
        .credentials("operator", "secret")
        .root_node_id("ns=2;s=Line1")
        .build()
        .unwrap();
    let driver = driver(config, &transport);

    driver.connect(&CancellationToken::new()).await.unwrap();

    let opened = transport.opened.lock().unwrap();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].endpoint.security_level, 50);
    assert_eq!(opened[0].user_token_policy_id, "user");
    assert!(matches!(
        &opened[0].identity,
        UserIdentity::UserName { username, .. } if username == "operator"
    ));
    assert_eq!(opened[0].client_identity.common_name, opened[0].application_name);
}

#[tokio::test]
async fn test_anonymous_picks_highest_security_level() {
    let endpoints = vec![
        anonymous_endpoint(),
        anonymous_endpoint().with_security(SecurityMode::SignAndEncrypt, BASIC256SHA256, 200),
        anonymous_endpoint().with_security(SecurityMode::Sign, BASIC256SHA256, 100),
    ];
    let transport = Arc::new(MockTransport::new(line()).with_endpoints(endpoints));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);

    driver.connect(&CancellationToken::new()).await.unwrap();

    let opened = transport.opened.lock().unwrap();
    assert_eq!(opened[0].endpoint.security_level, 200);
    assert_eq!(opened[0].endpoint.security_mode, SecurityMode::SignAndEncrypt);
    assert!(matches!(opened[0].identity, UserIdentity::Anonymous));
}

#[tokio::test]
async fn test_no_suitable_endpoint() {
    let endpoints = vec![EndpointDescription::new(ENDPOINT)
        .with_token(UserTokenPolicy::new("cert", UserTokenKind::Certificate))];
    let transport = Arc::new(MockTransport::new(line()).with_endpoints(endpoints));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);

    let err = driver.connect(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        OpcUaError::Connection(ConnectionError::ConnectFailed {
            step: ConnectStep::SelectEndpoint,
            ..
        })
    ));
    assert!(!err.is_retryable());
    assert_eq!(transport.session_count(), 0);
    assert_eq!(driver.session_manager().state(), SessionState::Disconnected);
    assert_eq!(driver.session_manager().stats().failures(), 1);
}

#[tokio::test]
async fn test_state_transitions_are_observable() {
    let transport = Arc::new(MockTransport::new(line()));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);
    let mut state = driver.session_manager().subscribe_state();
    assert_eq!(*state.borrow(), SessionState::Disconnected);

    driver.connect(&CancellationToken::new()).await.unwrap();
    assert!(state.has_changed().unwrap());
    assert_eq!(*state.borrow_and_update(), SessionState::Connected);

    driver.close(&CancellationToken::new()).await.unwrap();
    assert_eq!(*state.borrow_and_update(), SessionState::Disconnected);
    assert_eq!(driver.session_manager().stats().closes(), 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_browse() {
    let transport = Arc::new(MockTransport::new(line()).with_browse_delay(Duration::from_secs(60)));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = driver.connect(&cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(driver.tags().await.is_none());
    assert_eq!(transport.last_session().closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_read_makes_no_request() {
    let transport = Arc::new(MockTransport::new(line()));
    let driver = driver(config(&["ns=2;s=Line1"]), &transport);

    driver.connect(&CancellationToken::new()).await.unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = driver.read_batch(&cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.last_session().value_reads.load(Ordering::SeqCst), 0);
    assert!(driver.is_connected());
}

// =============================================================================
// Live server
// =============================================================================

#[cfg(feature = "real-transport")]
#[tokio::test]
#[ignore = "requires OPCUA_TEST_ENDPOINT"]
async fn test_live_server_browse_and_read() {
    use tagpoll_opcua::RealOpcUaTransport;

    let Ok(endpoint) = std::env::var("OPCUA_TEST_ENDPOINT") else {
        return;
    };
    let root = std::env::var("OPCUA_TEST_NODE_ID").unwrap_or_else(|_| "i=85".into());
    let config = ConnectorConfig::builder()
        .endpoint(endpoint)
        .root_node_id(root)
        .build()
        .unwrap();
    let driver = TagPollDriver::new(config, Arc::new(RealOpcUaTransport::new()));
    let cancel = CancellationToken::new();

    driver.connect(&cancel).await.unwrap();
    let tags = driver.tags().await.unwrap();
    let readings = driver.read_batch(&cancel).await.unwrap();
    assert!(readings.len() <= tags.len());
    driver.close(&cancel).await.unwrap();
}
