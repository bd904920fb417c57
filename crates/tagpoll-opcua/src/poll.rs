// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched value polling over a browsed tag list.
//!
//! One poll cycle issues a single Read request for every tag, renders each
//! scalar to text and classifies request-level failures:
//!
//! | Failure | Result |
//! |---------|--------|
//! | one of [`status::SESSION_FATAL`] | session invalidated, [`PollOutcome::ReconnectRequired`] |
//! | anything else | `Err`, session kept |
//! | unsupported value type | that reading skipped |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::browse::TagDefinition;
use crate::client::session::SessionManager;
use crate::client::transport::{cancellable, DataValue, OpcUaValue, ReadValueId, UaSession};
use crate::error::{OpcUaError, OpcUaResult, OperationError};
use crate::status;

/// Delay between successive poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Max-age hint sent with every Read request.
pub const READ_MAX_AGE: Duration = Duration::from_millis(2000);

/// Metadata key carrying the sanitized node id.
pub const PATH_METADATA_KEY: &str = "opcua_path";

// =============================================================================
// TagReading / PollOutcome
// =============================================================================

/// One successfully rendered value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReading {
    /// Canonical text of the value.
    pub payload: String,

    /// Sanitized node id, see [`sanitize_node_id`].
    pub opcua_path: String,

    /// Node id text.
    pub node_id: String,

    /// Browse path of the tag.
    pub path: String,

    /// Semantic data type of the tag.
    pub data_type: String,

    /// Status code of the value.
    pub status_code: u32,

    /// Source timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl TagReading {
    /// Returns the metadata pairs attached to the payload.
    pub fn metadata(&self) -> [(&'static str, &str); 1] {
        [(PATH_METADATA_KEY, self.opcua_path.as_str())]
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Readings in tag order, minus skipped values.
    Readings(Vec<TagReading>),

    /// The session hit a fatal status and was torn down.
    ReconnectRequired {
        /// The fatal status code.
        status_code: u32,
    },
}

impl PollOutcome {
    /// Returns `true` if the caller must reconnect and rebrowse.
    #[inline]
    pub fn is_reconnect_required(&self) -> bool {
        matches!(self, Self::ReconnectRequired { .. })
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
///
/// ```
/// use tagpoll_opcua::poll::sanitize_node_id;
///
/// assert_eq!(sanitize_node_id("ns=2;s=Temp#1"), "ns_2_s_Temp_1");
/// ```
pub fn sanitize_node_id(node_id: &str) -> String {
    node_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Renders a scalar value as canonical text.
///
/// Floats use the shortest representation that round-trips; non-finite
/// values render as `+Inf`, `-Inf` and `NaN`. Returns `None` for every other
/// variant, including empty values.
pub fn format_value(value: &OpcUaValue) -> Option<String> {
    let text = match value {
        OpcUaValue::Double(v) => format_float(*v),
        OpcUaValue::Float(v) if v.is_finite() => v.to_string(),
        OpcUaValue::Float(v) => format_float(f64::from(*v)),
        OpcUaValue::String(v) => v.clone(),
        OpcUaValue::Boolean(v) => v.to_string(),
        OpcUaValue::SByte(v) => v.to_string(),
        OpcUaValue::Byte(v) => v.to_string(),
        OpcUaValue::Int16(v) => v.to_string(),
        OpcUaValue::UInt16(v) => v.to_string(),
        OpcUaValue::Int32(v) => v.to_string(),
        OpcUaValue::UInt32(v) => v.to_string(),
        OpcUaValue::Int64(v) => v.to_string(),
        OpcUaValue::UInt64(v) => v.to_string(),
        _ => return None,
    };
    Some(text)
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        v.to_string()
    }
}

// =============================================================================
// PollLoop
// =============================================================================

/// Repeated batched reads against the session owned by a [`SessionManager`].
#[derive(Debug)]
pub struct PollLoop {
    manager: Arc<SessionManager>,
    interval: Duration,
    stats: PollStats,
}

impl PollLoop {
    /// Creates a poll loop paced at [`POLL_INTERVAL`].
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            interval: POLL_INTERVAL,
            stats: PollStats::new(),
        }
    }

    /// Overrides the delay between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the delay between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the poll statistics.
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Reads every tag once.
    ///
    /// A fatal request status invalidates `session` through the manager and
    /// yields [`PollOutcome::ReconnectRequired`]. Other request failures are
    /// returned as errors and leave the session in place.
    pub async fn poll_once(
        &self,
        session: &Arc<dyn UaSession>,
        tags: &[TagDefinition],
        cancel: &CancellationToken,
    ) -> OpcUaResult<PollOutcome> {
        if tags.is_empty() {
            return Ok(PollOutcome::Readings(Vec::new()));
        }

        let items: Vec<ReadValueId> = tags
            .iter()
            .map(|tag| ReadValueId::value(tag.node_id.clone()))
            .collect();

        let values = match cancellable(cancel, "read", session.read(&items, READ_MAX_AGE)).await {
            Ok(values) => values,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => return self.classify_failure(session, e).await,
        };
        self.stats.record_cycle();

        if values.len() != tags.len() {
            self.stats.record_failure();
            let error = OpcUaError::operation(OperationError::ResultCountMismatch {
                expected: tags.len(),
                actual: values.len(),
            });
            error.log("Read failed");
            return Err(error);
        }

        let mut readings = Vec::with_capacity(tags.len());
        for (tag, value) in tags.iter().zip(values) {
            match render(tag, value) {
                Some(reading) => readings.push(reading),
                None => self.stats.record_skip(),
            }
        }
        self.stats.record_readings(readings.len());

        Ok(PollOutcome::Readings(readings))
    }

    async fn classify_failure(
        &self,
        session: &Arc<dyn UaSession>,
        error: OpcUaError,
    ) -> OpcUaResult<PollOutcome> {
        self.stats.record_failure();

        match error.status_code().filter(|code| status::is_session_fatal(*code)) {
            Some(status_code) => {
                tracing::error!(error = %error, "Read failed");
                self.manager.invalidate(session, status_code).await;
                Ok(PollOutcome::ReconnectRequired { status_code })
            }
            None => {
                error.log("Read failed");
                Err(error)
            }
        }
    }

    /// Polls until cancelled or a fatal status requires a reconnect.
    ///
    /// Every non-empty batch is handed to `on_batch`. Non-fatal read errors
    /// are logged and the loop continues after the usual delay. Returns the
    /// fatal status code that ended the loop.
    pub async fn run<F>(
        &self,
        tags: &[TagDefinition],
        cancel: &CancellationToken,
        mut on_batch: F,
    ) -> OpcUaResult<u32>
    where
        F: FnMut(Vec<TagReading>) + Send,
    {
        let session = self.manager.session().await?;

        loop {
            match self.poll_once(&session, tags, cancel).await {
                Ok(PollOutcome::ReconnectRequired { status_code }) => return Ok(status_code),
                Ok(PollOutcome::Readings(readings)) if !readings.is_empty() => on_batch(readings),
                Ok(PollOutcome::Readings(_)) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                // Already logged by poll_once.
                Err(_) => {}
            }
            pace(self.interval, cancel).await?;
        }
    }
}

/// Sleeps for `interval` unless `cancel` fires first.
pub async fn pace(interval: Duration, cancel: &CancellationToken) -> OpcUaResult<()> {
    cancellable(cancel, "poll", async {
        tokio::time::sleep(interval).await;
        Ok(())
    })
    .await
}

fn render(tag: &TagDefinition, value: DataValue) -> Option<TagReading> {
    if !value.is_good() {
        tracing::warn!(
            node_id = %tag.node_id,
            status = status::status_code_name(value.status_code),
            status_code = value.status_code,
            "Status not good"
        );
    }

    let variant = value.value.unwrap_or_default();
    let Some(payload) = format_value(&variant) else {
        tracing::error!(
            node_id = %tag.node_id,
            value_type = variant.type_name(),
            "Unknown type, reading skipped"
        );
        return None;
    };

    let node_id = tag.node_id.to_string();
    Some(TagReading {
        payload,
        opcua_path: sanitize_node_id(&node_id),
        node_id,
        path: tag.path.clone(),
        data_type: tag.data_type.clone(),
        status_code: value.status_code,
        source_timestamp: value.source_timestamp,
        server_timestamp: value.server_timestamp,
    })
}

// =============================================================================
// PollStats
// =============================================================================

/// Poll counters.
#[derive(Debug, Default)]
pub struct PollStats {
    cycles: AtomicU64,
    readings: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
}

impl PollStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    fn record_readings(&self, count: usize) {
        self.readings.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Completed read requests.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Readings produced.
    pub fn readings(&self) -> u64 {
        self.readings.load(Ordering::Relaxed)
    }

    /// Values skipped for an unsupported type.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Failed read requests.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::certificate::{ClientIdentity, IdentityProvider};
    use crate::client::session::SessionState;
    use crate::client::transport::{ReferenceDescription, SessionOptions, UaTransport};
    use crate::types::{ConnectorConfig, EndpointDescription, NodeClass, NodeId, UserTokenKind, UserTokenPolicy};

    /// Session whose read result is scripted per call.
    struct ScriptedSession {
        responses: Mutex<Vec<OpcUaResult<Vec<DataValue>>>>,
        closed: Mutex<usize>,
    }

    #[async_trait]
    impl UaSession for ScriptedSession {
        async fn read(&self, _: &[ReadValueId], max_age: Duration) -> OpcUaResult<Vec<DataValue>> {
            assert_eq!(max_age, READ_MAX_AGE);
            self.responses.lock().unwrap().remove(0)
        }

        async fn browse(&self, _: &NodeId, _: &NodeId) -> OpcUaResult<Vec<ReferenceDescription>> {
            Ok(Vec::new())
        }

        async fn close(&self) -> OpcUaResult<()> {
            *self.closed.lock().unwrap() += 1;
            Ok(())
        }

        fn endpoint_url(&self) -> &str {
            "opc.tcp://scripted"
        }
    }

    struct ScriptedTransport {
        session: Arc<ScriptedSession>,
    }

    #[async_trait]
    impl UaTransport for ScriptedTransport {
        async fn discover_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
            Ok(vec![EndpointDescription::new(url)
                .with_token(UserTokenPolicy::new("anon", UserTokenKind::Anonymous))])
        }

        async fn open_session(&self, _: SessionOptions) -> OpcUaResult<Arc<dyn UaSession>> {
            Ok(self.session.clone())
        }

        fn display_name(&self) -> String {
            "scripted".into()
        }
    }

    struct FixedIdentity;

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn provision(&self, hint: &str) -> OpcUaResult<ClientIdentity> {
            Ok(ClientIdentity {
                certificate_der: vec![0x30],
                private_key_pem: String::new(),
                application_uri: format!("urn:{}:client-test0000", hint),
                common_name: hint.into(),
                not_before: Utc::now(),
                not_after: Utc::now(),
            })
        }
    }

    fn tag(node_id: NodeId, path: &str, data_type: &str) -> TagDefinition {
        TagDefinition {
            node_id,
            node_class: NodeClass::Variable,
            browse_name: path.rsplit('.').next().unwrap_or(path).into(),
            path: path.into(),
            data_type: data_type.into(),
            writable: false,
            description: String::new(),
            unit: String::new(),
            scale: String::new(),
            min: String::new(),
            max: String::new(),
        }
    }

    async fn connected(
        responses: Vec<OpcUaResult<Vec<DataValue>>>,
    ) -> (PollLoop, Arc<SessionManager>, Arc<ScriptedSession>, Arc<dyn UaSession>) {
        let session = Arc::new(ScriptedSession {
            responses: Mutex::new(responses),
            closed: Mutex::new(0),
        });
        let config = ConnectorConfig::builder()
            .endpoint("opc.tcp://scripted:4840")
            .root_node_id("ns=2;s=Root")
            .build()
            .unwrap();
        let manager = Arc::new(SessionManager::with_identity_provider(
            config,
            Arc::new(ScriptedTransport {
                session: session.clone(),
            }),
            Arc::new(FixedIdentity),
        ));
        manager.connect(&CancellationToken::new()).await.unwrap();
        let handle = manager.session().await.unwrap();
        (PollLoop::new(manager.clone()), manager, session, handle)
    }

    #[test]
    fn test_sanitize_node_id() {
        assert_eq!(sanitize_node_id("ns=2;s=Temp#1"), "ns_2_s_Temp_1");
        assert_eq!(sanitize_node_id("i=2258"), "i_2258");
        assert_eq!(sanitize_node_id("ns=3;s=Line-1_ok"), "ns_3_s_Line-1_ok");
        assert_eq!(sanitize_node_id("ns=2;s=Ä"), "ns_2_s__");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&OpcUaValue::Double(0.1)).as_deref(), Some("0.1"));
        assert_eq!(format_value(&OpcUaValue::Double(25.0)).as_deref(), Some("25"));
        assert_eq!(format_value(&OpcUaValue::Float(1.5)).as_deref(), Some("1.5"));
        assert_eq!(format_value(&OpcUaValue::Float(0.1)).as_deref(), Some("0.1"));
        assert_eq!(format_value(&OpcUaValue::Int32(-42)).as_deref(), Some("-42"));
        assert_eq!(format_value(&OpcUaValue::UInt64(u64::MAX)).as_deref(), Some("18446744073709551615"));
        assert_eq!(format_value(&OpcUaValue::SByte(-8)).as_deref(), Some("-8"));
        assert_eq!(format_value(&OpcUaValue::Boolean(true)).as_deref(), Some("true"));
        assert_eq!(format_value(&OpcUaValue::String("run".into())).as_deref(), Some("run"));
        assert_eq!(format_value(&OpcUaValue::Null), None);
        assert_eq!(format_value(&OpcUaValue::DateTime(Utc::now())), None);
        assert_eq!(format_value(&OpcUaValue::Array(vec![OpcUaValue::Int32(1)])), None);
    }

    #[test]
    fn test_format_non_finite_floats() {
        assert_eq!(format_value(&OpcUaValue::Double(f64::INFINITY)).as_deref(), Some("+Inf"));
        assert_eq!(format_value(&OpcUaValue::Double(f64::NEG_INFINITY)).as_deref(), Some("-Inf"));
        assert_eq!(format_value(&OpcUaValue::Double(f64::NAN)).as_deref(), Some("NaN"));
        assert_eq!(format_value(&OpcUaValue::Float(f32::INFINITY)).as_deref(), Some("+Inf"));
        assert_eq!(format_value(&OpcUaValue::Float(f32::NEG_INFINITY)).as_deref(), Some("-Inf"));
        assert_eq!(format_value(&OpcUaValue::Float(f32::NAN)).as_deref(), Some("NaN"));
        assert_eq!(format_value(&OpcUaValue::Double(-0.5)).as_deref(), Some("-0.5"));
        assert_eq!(format_value(&OpcUaValue::Float(-1.5)).as_deref(), Some("-1.5"));
    }

    #[tokio::test]
    async fn test_poll_once_renders_in_order() {
        let now = Utc::now();
        let (poll, _, _, session) = connected(vec![Ok(vec![
            DataValue::good(OpcUaValue::Int32(42)).with_timestamps(now, now),
            DataValue::good(OpcUaValue::Boolean(true)),
        ])])
        .await;
        let tags = vec![
            tag(NodeId::string(2, "R.A"), "A", "int32"),
            tag(NodeId::string(2, "R.B.C"), "B.C", "bool"),
        ];

        let outcome = poll.poll_once(&session, &tags, &CancellationToken::new()).await.unwrap();
        let PollOutcome::Readings(readings) = outcome else {
            panic!("expected readings");
        };

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].payload, "42");
        assert_eq!(readings[0].opcua_path, "ns_2_s_R_A");
        assert_eq!(readings[0].source_timestamp, Some(now));
        assert_eq!(readings[1].payload, "true");
        assert_eq!(readings[1].metadata(), [("opcua_path", "ns_2_s_R_B_C")]);
        assert_eq!(poll.stats().readings(), 2);
    }

    #[tokio::test]
    async fn test_unknown_type_skips_one_reading() {
        let (poll, _, _, session) = connected(vec![Ok(vec![
            DataValue::good(OpcUaValue::Double(1.25)),
            DataValue::good(OpcUaValue::Other("ExtensionObject".into())),
            DataValue::bad(status::BAD_NOT_READABLE),
            DataValue::good(OpcUaValue::String("ok".into())),
        ])])
        .await;
        let tags: Vec<_> = (1..=4)
            .map(|i| tag(NodeId::numeric(2, i), &format!("T{}", i), "float64"))
            .collect();

        let outcome = poll.poll_once(&session, &tags, &CancellationToken::new()).await.unwrap();
        let PollOutcome::Readings(readings) = outcome else {
            panic!("expected readings");
        };

        let payloads: Vec<_> = readings.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["1.25", "ok"]);
        assert_eq!(poll.stats().skipped(), 2);
    }

    #[tokio::test]
    async fn test_fatal_status_invalidates_session() {
        for code in status::SESSION_FATAL {
            let (poll, manager, scripted, session) =
                connected(vec![Err(OpcUaError::service_fault("Read", code))]).await;
            let tags = vec![tag(NodeId::numeric(2, 1), "A", "int32")];

            let outcome = poll.poll_once(&session, &tags, &CancellationToken::new()).await.unwrap();
            assert_eq!(outcome, PollOutcome::ReconnectRequired { status_code: code });
            assert_eq!(manager.state(), SessionState::Disconnected);
            assert_eq!(*scripted.closed.lock().unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_non_fatal_status_keeps_session() {
        let (poll, manager, scripted, session) = connected(vec![Err(OpcUaError::service_fault(
            "Read",
            status::BAD_TOO_MANY_OPERATIONS,
        ))])
        .await;
        let tags = vec![tag(NodeId::numeric(2, 1), "A", "int32")];

        let err = poll
            .poll_once(&session, &tags, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(status::BAD_TOO_MANY_OPERATIONS));
        assert!(manager.is_connected());
        assert_eq!(*scripted.closed.lock().unwrap(), 0);
        assert_eq!(poll.stats().failures(), 1);
    }

    #[tokio::test]
    async fn test_result_count_mismatch() {
        let (poll, manager, _, session) =
            connected(vec![Ok(vec![DataValue::good(OpcUaValue::Int32(1))])]).await;
        let tags = vec![
            tag(NodeId::numeric(2, 1), "A", "int32"),
            tag(NodeId::numeric(2, 2), "B", "int32"),
        ];

        let err = poll
            .poll_once(&session, &tags, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Operation(OperationError::ResultCountMismatch { expected: 2, actual: 1 })
        ));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_empty_tag_list_sends_nothing() {
        let (poll, _, _, session) = connected(Vec::new()).await;
        let outcome = poll.poll_once(&session, &[], &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, PollOutcome::Readings(Vec::new()));
        assert_eq!(poll.stats().cycles(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_read_is_distinct() {
        let (poll, manager, _, session) = connected(Vec::new()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poll
            .poll_once(&session, &[tag(NodeId::numeric(2, 1), "A", "int32")], &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_fatal() {
        let (poll, _, _, _) = connected(vec![
            Ok(vec![DataValue::good(OpcUaValue::UInt16(7))]),
            Err(OpcUaError::service_fault("Read", status::BAD_NOT_READABLE)),
            Ok(vec![DataValue::good(OpcUaValue::UInt16(8))]),
            Err(OpcUaError::service_fault("Read", status::BAD_CONNECTION_CLOSED)),
        ])
        .await;
        let tags = vec![tag(NodeId::numeric(2, 1), "A", "uint16")];
        let mut batches = Vec::new();

        let started = tokio::time::Instant::now();
        let code = poll
            .run(&tags, &CancellationToken::new(), |batch| batches.push(batch))
            .await
            .unwrap();

        assert_eq!(code, status::BAD_CONNECTION_CLOSED);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][0].payload, "8");
        assert!(started.elapsed() >= POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let (poll, _, _, _) =
            connected(vec![Ok(vec![DataValue::good(OpcUaValue::Int64(1))])]).await;
        let tags = vec![tag(NodeId::numeric(2, 1), "A", "int64")];
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let err = poll
            .run(&tags, &cancel, move |_| trigger.cancel())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
