// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Poll runtime orchestration.
//!
//! ```text
//!   connect (retry) ──▶ browse ──▶ read_batch ──▶ write lines
//!        ▲                             │
//!        └──── session lost ◀──────────┘
//! ```
//!
//! The loop ends on shutdown, after `max_batches`, or on a setup error that
//! retrying cannot fix.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tagpoll_config::TagPollConfig;
use tagpoll_opcua::poll::pace;
use tagpoll_opcua::{OpcUaError, TagDefinition, TagPollDriver, TagReading, UaTransport};

use crate::cli::ReadingFormat;
use crate::error::{BinError, BinResult};

/// Delay before a reconnect when the error suggests none.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Time the final session close may take before it is abandoned.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Transport
// =============================================================================

/// Returns the transport the binary talks to servers with.
#[cfg(feature = "real-transport")]
pub fn default_transport() -> BinResult<Arc<dyn UaTransport>> {
    Ok(Arc::new(tagpoll_opcua::RealOpcUaTransport::new()))
}

/// Returns the transport the binary talks to servers with.
#[cfg(not(feature = "real-transport"))]
pub fn default_transport() -> BinResult<Arc<dyn UaTransport>> {
    Err(BinError::init(
        "built without the `real-transport` feature; no OPC UA transport available",
    ))
}

// =============================================================================
// PollRuntime
// =============================================================================

/// Connects, browses and streams readings until told to stop.
pub struct PollRuntime {
    driver: TagPollDriver,
    format: ReadingFormat,
    max_batches: Option<u64>,
}

impl PollRuntime {
    /// Creates a runtime for `config` over `transport`.
    pub fn new(config: &TagPollConfig, transport: Arc<dyn UaTransport>) -> BinResult<Self> {
        Ok(Self::with_driver(TagPollDriver::new(
            config.connector_config()?,
            transport,
        ))
        .with_format(config.output.format.into()))
    }

    /// Creates a runtime around an existing driver.
    pub fn with_driver(driver: TagPollDriver) -> Self {
        Self {
            driver,
            format: ReadingFormat::Json,
            max_batches: None,
        }
    }

    /// Sets the reading line format.
    pub fn with_format(mut self, format: ReadingFormat) -> Self {
        self.format = format;
        self
    }

    /// Stops after `max` batches.
    pub fn with_max_batches(mut self, max: Option<u64>) -> Self {
        self.max_batches = max;
        self
    }

    /// Returns the driver.
    pub fn driver(&self) -> &TagPollDriver {
        &self.driver
    }

    /// Runs until `cancel` fires or the batch limit is reached.
    ///
    /// Returns the number of batches written. Cancellation is a clean exit.
    pub async fn run<W: Write>(&self, out: &mut W, cancel: &CancellationToken) -> BinResult<u64> {
        info!(endpoint = %self.driver.config().endpoint, "Starting tagpoll");
        let result = self.poll_until_done(out, cancel).await;
        close_driver(&self.driver).await;

        match result {
            Err(BinError::Connector(e)) if e.is_cancelled() => {
                info!("Stopped");
                Ok(0)
            }
            other => other,
        }
    }

    async fn poll_until_done<W: Write>(
        &self,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> BinResult<u64> {
        let mut batches = 0u64;

        loop {
            connect_with_retry(&self.driver, cancel).await?;

            loop {
                if self.max_batches.is_some_and(|max| batches >= max) {
                    return Ok(batches);
                }

                match self.driver.read_batch(cancel).await {
                    Ok(readings) => {
                        write_readings(out, &readings, self.format)?;
                        batches += 1;
                    }
                    Err(e) if e.is_cancelled() => return Err(e.into()),
                    Err(e) if e.requires_reconnect() => {
                        warn!(error = %e, "Session lost, reconnecting");
                        break;
                    }
                    Err(e) => {
                        e.log("Read failed");
                        pace(self.driver.poll_loop().interval(), cancel).await?;
                    }
                }
            }
        }
    }
}

/// Connects and browses, retrying errors that may clear up.
///
/// Setup errors such as a missing endpoint type are returned immediately.
pub async fn connect_with_retry(
    driver: &TagPollDriver,
    cancel: &CancellationToken,
) -> Result<(), OpcUaError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match driver.connect(cancel).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_cancelled() || !e.is_retryable() => return Err(e),
            Err(e) => {
                let delay = e.suggested_retry_delay().unwrap_or(DEFAULT_RETRY_DELAY);
                e.log("Connect failed");
                info!(attempt, delay_ms = delay.as_millis() as u64, "Retrying connect");
                pace(delay, cancel).await?;
            }
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Writes one line per reading.
pub fn write_readings<W: Write>(
    out: &mut W,
    readings: &[TagReading],
    format: ReadingFormat,
) -> BinResult<()> {
    for reading in readings {
        match format {
            ReadingFormat::Json => {
                let line = serde_json::to_string(reading)
                    .map_err(|e| BinError::runtime(format!("Failed to encode reading: {}", e)))?;
                writeln!(out, "{}", line)?;
            }
            ReadingFormat::Text => {
                writeln!(out, "{} ({}) = {}", reading.path, reading.node_id, reading.payload)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Connects once, browses and closes.
pub async fn browse_once(
    driver: &TagPollDriver,
    cancel: &CancellationToken,
) -> BinResult<Arc<Vec<TagDefinition>>> {
    let result = async {
        driver.connect(cancel).await?;
        driver
            .tags()
            .await
            .ok_or_else(|| BinError::runtime("Browse produced no tag list"))
    }
    .await;

    close_driver(driver).await;
    result
}

/// Closes the session, giving up after [`CLOSE_TIMEOUT`].
///
/// Runs with its own token: shutdown has usually fired by now.
pub async fn close_driver(driver: &TagPollDriver) {
    let cancel = CancellationToken::new();
    let close = driver.close(&cancel);
    tokio::pin!(close);

    let result = tokio::select! {
        result = &mut close => result,
        _ = tokio::time::sleep(CLOSE_TIMEOUT) => {
            cancel.cancel();
            close.await
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "Close failed");
    }
}

/// Writes the tag table as CSV records with a header row.
pub fn write_csv<W: Write>(out: &mut W, tags: &[TagDefinition]) -> BinResult<()> {
    writeln!(out, "{}", csv_row(TagDefinition::RECORD_HEADER.iter().copied()))?;
    for tag in tags {
        let record = tag.records();
        writeln!(out, "{}", csv_row(record.iter().map(String::as_str)))?;
    }
    out.flush()?;
    Ok(())
}

fn csv_row<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(csv_field).collect::<Vec<_>>().join(",")
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use tagpoll_opcua::client::{
        DataValue, OpcUaValue, ReadValueId, ReferenceDescription, SessionOptions,
    };
    use tagpoll_opcua::types::{AttributeId, NodeClass, UserTokenKind, UserTokenPolicy};
    use tagpoll_opcua::{
        status, ClientIdentity, ConnectorConfig, EndpointDescription, IdentityProvider, NodeId,
        OpcUaResult, UaSession,
    };

    const ENDPOINT: &str = "opc.tcp://plc:4840";

    /// `ns=2;s=Line1` organizes one Double variable `ns=2;s=Temp`.
    struct OneTagSession {
        reads: AtomicUsize,
        fail_read: Option<u32>,
        data_type_fault: Mutex<Option<u32>>,
    }

    #[async_trait]
    impl UaSession for OneTagSession {
        async fn read(&self, items: &[ReadValueId], _: Duration) -> OpcUaResult<Vec<DataValue>> {
            let is_root = items[0].node_id == NodeId::string(2, "Line1");
            if items[0].attribute == AttributeId::Value {
                if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                    if let Some(code) = self.fail_read {
                        return Err(OpcUaError::service_fault("Read", code));
                    }
                }
                return Ok(vec![DataValue::good(OpcUaValue::Double(21.5))]);
            }
            Ok(items
                .iter()
                .map(|item| match (item.attribute, is_root) {
                    (AttributeId::NodeClass, true) => {
                        DataValue::good(OpcUaValue::Int32(NodeClass::Object.value() as i32))
                    }
                    (AttributeId::NodeClass, false) => {
                        DataValue::good(OpcUaValue::Int32(NodeClass::Variable.value() as i32))
                    }
                    (AttributeId::BrowseName, root) => DataValue::good(OpcUaValue::QualifiedName {
                        namespace_index: 2,
                        name: if root { "Line1" } else { "Temp, C" }.into(),
                    }),
                    (AttributeId::DataType, false) => match self.data_type_fault.lock().unwrap().take() {
                        Some(code) => DataValue::bad(code),
                        None => DataValue::good(OpcUaValue::NodeId(NodeId::numeric(0, 11))),
                    },
                    _ => DataValue::bad(status::BAD_ATTRIBUTE_ID_INVALID),
                })
                .collect())
        }

        async fn browse(
            &self,
            node_id: &NodeId,
            reference_type: &NodeId,
        ) -> OpcUaResult<Vec<ReferenceDescription>> {
            if *node_id == NodeId::string(2, "Line1") && *reference_type == NodeId::ORGANIZES {
                return Ok(vec![ReferenceDescription {
                    node_id: NodeId::string(2, "Temp"),
                    browse_name: "Temp, C".into(),
                    node_class: NodeClass::Variable,
                }]);
            }
            Ok(Vec::new())
        }

        async fn close(&self) -> OpcUaResult<()> {
            Ok(())
        }

        fn endpoint_url(&self) -> &str {
            ENDPOINT
        }
    }

    struct OneTagTransport {
        fail_first_read: Option<u32>,
        fail_first_browse: Option<u32>,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl UaTransport for OneTagTransport {
        async fn discover_endpoints(&self, url: &str) -> OpcUaResult<Vec<EndpointDescription>> {
            Ok(vec![EndpointDescription::new(url)
                .with_token(UserTokenPolicy::new("anon", UserTokenKind::Anonymous))])
        }

        async fn open_session(&self, _: SessionOptions) -> OpcUaResult<Arc<dyn UaSession>> {
            let first = self.opened.fetch_add(1, Ordering::SeqCst) == 0;
            Ok(Arc::new(OneTagSession {
                reads: AtomicUsize::new(0),
                fail_read: self.fail_first_read.filter(|_| first),
                data_type_fault: Mutex::new(self.fail_first_browse.filter(|_| first)),
            }))
        }

        fn display_name(&self) -> String {
            "one-tag".into()
        }
    }

    struct FixedIdentity;

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn provision(&self, hint: &str) -> OpcUaResult<ClientIdentity> {
            let now = Utc::now();
            Ok(ClientIdentity {
                certificate_der: vec![0x30],
                private_key_pem: String::new(),
                application_uri: format!("urn:{}:client-test0000", hint),
                common_name: hint.into(),
                not_before: now,
                not_after: now,
            })
        }
    }

    fn driver(transport: Arc<OneTagTransport>) -> TagPollDriver {
        let config = ConnectorConfig::builder()
            .endpoint(ENDPOINT)
            .root_node_id("ns=2;s=Line1")
            .build()
            .unwrap();
        TagPollDriver::with_identity_provider(config, transport, Arc::new(FixedIdentity))
            .with_poll_interval(Duration::from_millis(1))
    }

    fn transport(fail_first_read: Option<u32>) -> Arc<OneTagTransport> {
        Arc::new(OneTagTransport {
            fail_first_read,
            fail_first_browse: None,
            opened: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_run_writes_json_lines() {
        let runtime = PollRuntime::with_driver(driver(transport(None))).with_max_batches(Some(2));
        let mut out = Vec::new();

        let batches = runtime.run(&mut out, &CancellationToken::new()).await.unwrap();

        assert_eq!(batches, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let reading: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(reading["payload"], "21.5");
        assert_eq!(reading["opcua_path"], "ns_2_s_Temp");
        assert_eq!(reading["data_type"], "float64");
        assert!(!runtime.driver().is_connected());
    }

    #[tokio::test]
    async fn test_run_reconnects_after_fatal_status() {
        let transport = transport(Some(status::BAD_CONNECTION_CLOSED));
        let runtime = PollRuntime::with_driver(driver(transport.clone()))
            .with_format(ReadingFormat::Text)
            .with_max_batches(Some(1));
        let mut out = Vec::new();

        runtime.run(&mut out, &CancellationToken::new()).await.unwrap();

        assert_eq!(transport.opened.load(Ordering::SeqCst), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "Temp, C (ns=2;s=Temp) = 21.5\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_after_browse_failure() {
        let transport = Arc::new(OneTagTransport {
            fail_first_read: None,
            fail_first_browse: Some(status::BAD_TOO_MANY_OPERATIONS),
            opened: AtomicUsize::new(0),
        });
        let runtime = PollRuntime::with_driver(driver(transport.clone()))
            .with_format(ReadingFormat::Text)
            .with_max_batches(Some(1));
        let mut out = Vec::new();

        let batches = runtime.run(&mut out, &CancellationToken::new()).await.unwrap();

        assert_eq!(batches, 1);
        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Temp, C (ns=2;s=Temp) = 21.5\n");
        assert_eq!(runtime.driver().session_manager().stats().invalidations(), 0);
    }

    #[tokio::test]
    async fn test_run_cancelled_is_clean() {
        let runtime = PollRuntime::with_driver(driver(transport(None)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let batches = runtime.run(&mut Vec::new(), &cancel).await.unwrap();
        assert_eq!(batches, 0);
    }

    #[tokio::test]
    async fn test_browse_once_and_csv() {
        let driver = driver(transport(None));
        let tags = browse_once(&driver, &CancellationToken::new()).await.unwrap();
        assert!(!driver.is_connected());

        let mut out = Vec::new();
        write_csv(&mut out, &tags).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("BrowseName,DataType,NodeID"));
        assert!(lines[1].starts_with("\"Temp, C\",float64,ns=2;s=Temp"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
