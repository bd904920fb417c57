// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connect / read / close facade for host pipelines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        TagPollDriver                            │
//! │               connect() · read_batch() · close()                │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                       │                     │
//!          ▼                       ▼                     ▼
//!   SessionManager          NodeTreeBrowser          PollLoop
//!   (owns the session)      (tag list per session)   (batched reads)
//!          │
//!          ▼
//!   UaTransport / UaSession
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use tagpoll_opcua::{ConnectorConfig, TagPollDriver};
//!
//! let config = ConnectorConfig::builder()
//!     .endpoint("opc.tcp://192.168.1.100:4840")
//!     .root_node_id("ns=2;s=Line1")
//!     .build()?;
//!
//! let driver = TagPollDriver::new(config, transport);
//! driver.connect(&cancel).await?;
//! loop {
//!     for reading in driver.read_batch(&cancel).await? {
//!         println!("{} = {}", reading.opcua_path, reading.payload);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::browse::{BrowseOptions, NodeTreeBrowser, TagDefinition};
use crate::certificate::IdentityProvider;
use crate::client::session::SessionManager;
use crate::client::transport::UaTransport;
use crate::error::{OpcUaError, OpcUaResult, SessionError};
use crate::poll::{pace, PollLoop, PollOutcome, TagReading};
use crate::types::ConnectorConfig;

// =============================================================================
// TagPollDriver
// =============================================================================

/// Discovers tags once per session and polls them.
///
/// The tag list belongs to the session it was browsed on. It is dropped
/// whenever the session goes away and rebuilt by the next
/// [`connect`](Self::connect).
pub struct TagPollDriver {
    manager: Arc<SessionManager>,
    browser: NodeTreeBrowser,
    poll: PollLoop,
    tags: RwLock<Option<Arc<Vec<TagDefinition>>>>,
}

impl TagPollDriver {
    /// Creates a driver with the self-signed identity provider.
    pub fn new(config: ConnectorConfig, transport: Arc<dyn UaTransport>) -> Self {
        Self::from_manager(SessionManager::new(config, transport))
    }

    /// Creates a driver with a custom identity provider.
    pub fn with_identity_provider(
        config: ConnectorConfig,
        transport: Arc<dyn UaTransport>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::from_manager(SessionManager::with_identity_provider(
            config,
            transport,
            identity_provider,
        ))
    }

    fn from_manager(manager: SessionManager) -> Self {
        let options = BrowseOptions::default().with_dedupe_visited(manager.config().dedupe_visited);
        let manager = Arc::new(manager);
        Self {
            browser: NodeTreeBrowser::new(options),
            poll: PollLoop::new(manager.clone()),
            manager,
            tags: RwLock::new(None),
        }
    }

    /// Overrides the delay applied after every batch.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll = self.poll.with_interval(interval);
        self
    }

    /// Returns the connector configuration.
    pub fn config(&self) -> &ConnectorConfig {
        self.manager.config()
    }

    /// Returns the session manager.
    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Returns the poll loop.
    pub fn poll_loop(&self) -> &PollLoop {
        &self.poll
    }

    /// Returns `true` if a session is live.
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Returns the tag list of the current session, if browsed.
    pub async fn tags(&self) -> Option<Arc<Vec<TagDefinition>>> {
        self.tags.read().await.clone()
    }

    /// Connects and browses the configured roots.
    ///
    /// No-op if a session is live and its tags are known. A browse failure
    /// leaves the session open unless its status is session-fatal; the next
    /// call browses again.
    pub async fn connect(&self, cancel: &CancellationToken) -> OpcUaResult<()> {
        let mut tags = self.tags.write().await;
        if self.manager.is_connected() && tags.is_some() {
            return Ok(());
        }
        *tags = None;

        self.manager.connect(cancel).await?;
        let session = self.manager.session().await?;

        tracing::info!(
            roots = self.config().root_node_ids.len(),
            "Browsing large node trees can take a long time"
        );

        let browsed = match self
            .browser
            .browse(session.as_ref(), &self.config().root_node_ids, cancel)
            .await
        {
            Ok(browsed) => browsed,
            Err(e) => {
                if let Some(code) = e.status_code().filter(|_| e.requires_reconnect()) {
                    self.manager.invalidate(&session, code).await;
                }
                e.log("Browse failed");
                return Err(e);
            }
        };

        log_detected_tags(&browsed);
        *tags = Some(Arc::new(browsed));
        Ok(())
    }

    /// Reads every tag once, then waits out the poll interval.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if [`connect`](Self::connect) has not completed.
    /// - [`SessionError::Lost`] if a fatal status tore the session down. The
    ///   caller must reconnect.
    /// - Any non-fatal read failure. The session stays usable.
    pub async fn read_batch(&self, cancel: &CancellationToken) -> OpcUaResult<Vec<TagReading>> {
        let tags = self.tags().await.ok_or_else(OpcUaError::not_connected)?;
        let session = self.manager.session().await?;

        match self.poll.poll_once(&session, &tags, cancel).await? {
            PollOutcome::Readings(readings) => {
                pace(self.poll.interval(), cancel).await?;
                Ok(readings)
            }
            PollOutcome::ReconnectRequired { status_code } => {
                *self.tags.write().await = None;
                Err(OpcUaError::session(SessionError::lost(status_code)))
            }
        }
    }

    /// Closes the session and forgets the tag list.
    ///
    /// If `cancel` fires before the server acknowledges, the session is
    /// abandoned and `Cancelled` is returned.
    pub async fn close(&self, cancel: &CancellationToken) -> OpcUaResult<()> {
        *self.tags.write().await = None;
        self.manager.close(cancel).await
    }
}

impl std::fmt::Debug for TagPollDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagPollDriver")
            .field("endpoint", &self.config().endpoint)
            .field("state", &self.manager.state())
            .field("browse_options", &self.browser.options())
            .finish()
    }
}

fn log_detected_tags(tags: &[TagDefinition]) {
    tracing::info!(count = tags.len(), "Detected nodes");
    if tracing::enabled!(tracing::Level::DEBUG) {
        match serde_json::to_string(tags) {
            Ok(json) => tracing::debug!(nodes = %json, "Detected nodes"),
            Err(e) => tracing::debug!(error = %e, "Could not serialize detected nodes"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::client::transport::{SessionOptions, UaSession};
    use crate::types::EndpointDescription;

    struct Unreachable;

    #[async_trait]
    impl UaTransport for Unreachable {
        async fn discover_endpoints(&self, _: &str) -> OpcUaResult<Vec<EndpointDescription>> {
            panic!("no network call expected")
        }

        async fn open_session(&self, _: SessionOptions) -> OpcUaResult<Arc<dyn UaSession>> {
            panic!("no network call expected")
        }

        fn display_name(&self) -> String {
            "unreachable".into()
        }
    }

    fn driver() -> TagPollDriver {
        let config = ConnectorConfig::builder()
            .endpoint("opc.tcp://plc:4840")
            .root_node_id("ns=2;s=Line1")
            .dedupe_visited(true)
            .build()
            .unwrap();
        TagPollDriver::new(config, Arc::new(Unreachable))
    }

    #[tokio::test]
    async fn test_read_before_connect() {
        let driver = driver();
        let err = driver.read_batch(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Connection(crate::error::ConnectionError::NotConnected)
        ));
        assert!(driver.tags().await.is_none());
    }

    #[tokio::test]
    async fn test_close_when_disconnected() {
        let driver = driver();
        driver.close(&CancellationToken::new()).await.unwrap();
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    async fn test_cancelled_connect_makes_no_call() {
        let driver = driver();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = driver.connect(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_browse_options_from_config() {
        let driver = driver().with_poll_interval(Duration::from_millis(250));
        assert!(driver.browser.options().dedupe_visited);
        assert_eq!(driver.poll_loop().interval(), Duration::from_millis(250));
        assert!(format!("{:?}", driver).contains("opc.tcp://plc:4840"));
    }
}
