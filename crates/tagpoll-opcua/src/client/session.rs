// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA session management.
//!
//! [`SessionManager`] owns the one live session: it runs the connect sequence
//! (discover, select, provision, assemble, open), hands out clones of the
//! session handle, and is the only component that ever closes it.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!      ▲                        │                  │
//!      └────────error───────────┘                  │
//!      └──────────────close / invalidate───────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::transport::{cancellable, SessionOptions, UaSession, UaTransport};
use crate::certificate::{ClientIdentity, IdentityProvider, SelfSignedProvider};
use crate::endpoint::{log_endpoints, select_endpoint};
use crate::error::{ConnectStep, ConnectionError, OpcUaError, OpcUaResult};
use crate::status;
use crate::types::{ConnectorConfig, EndpointDescription};

// =============================================================================
// SessionState
// =============================================================================

/// State of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session.
    #[default]
    Disconnected,

    /// The connect sequence is running.
    Connecting,

    /// A session is live.
    Connected,
}

impl SessionState {
    /// Returns `true` if a session is live.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Owns the session lifecycle.
///
/// Connect, close and invalidate are serialized by one async mutex around the
/// session slot. Callers borrow the session through [`SessionManager::session`]
/// and never close it themselves.
pub struct SessionManager {
    config: ConnectorConfig,
    transport: Arc<dyn UaTransport>,
    identity_provider: Arc<dyn IdentityProvider>,
    slot: Mutex<Option<Arc<dyn UaSession>>>,
    state: watch::Sender<SessionState>,
    stats: SessionStats,
}

impl SessionManager {
    /// Creates a manager that provisions self-signed identities.
    pub fn new(config: ConnectorConfig, transport: Arc<dyn UaTransport>) -> Self {
        Self::with_identity_provider(config, transport, Arc::new(SelfSignedProvider::new()))
    }

    /// Creates a manager with a custom identity source.
    pub fn with_identity_provider(
        config: ConnectorConfig,
        transport: Arc<dyn UaTransport>,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            transport,
            identity_provider,
            slot: Mutex::new(None),
            state,
            stats: SessionStats::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns `true` if a session is live.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribes to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns the session statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Establishes a session unless one is already live.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the configuration is invalid; nothing touches the network.
    /// - `Connection(ConnectFailed { step, .. })` if a connect step fails.
    /// - `Cancelled` if `cancel` fires first.
    pub async fn connect(&self, cancel: &CancellationToken) -> OpcUaResult<()> {
        self.config.validate()?;

        let mut slot = cancellable(cancel, "connect", async { Ok(self.slot.lock().await) }).await?;
        if slot.is_some() {
            return Ok(());
        }

        self.set_state(SessionState::Connecting);
        let mut guard = ConnectingGuard {
            state: &self.state,
            armed: true,
        };

        match self.establish(cancel).await {
            Ok(session) => {
                tracing::info!(
                    endpoint = %session.endpoint_url(),
                    transport = %self.transport.display_name(),
                    "OPC UA session established"
                );
                *slot = Some(session);
                self.stats.record_connect();
                guard.armed = false;
                self.set_state(SessionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.stats.record_failure();
                Err(e)
            }
        }
    }

    async fn establish(&self, cancel: &CancellationToken) -> OpcUaResult<Arc<dyn UaSession>> {
        let url = self.config.endpoint.as_str();
        let at = |step: ConnectStep| {
            move |e: OpcUaError| {
                if e.is_cancelled() {
                    e
                } else {
                    OpcUaError::connection(ConnectionError::connect_failed(step, url, e))
                }
            }
        };

        tracing::info!(endpoint = %url, "Discovering endpoints");
        let endpoints = cancellable(cancel, "discover_endpoints", self.transport.discover_endpoints(url))
            .await
            .map_err(at(ConnectStep::Discover))?;
        log_endpoints(&endpoints);

        let auth_mode = self.config.auth_mode();
        let endpoint = select_endpoint(&endpoints, auth_mode)
            .cloned()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::no_suitable_endpoint(url, auth_mode.to_string()))
            })
            .map_err(at(ConnectStep::SelectEndpoint))?;
        tracing::info!(
            endpoint = %endpoint.endpoint_url,
            security_mode = %endpoint.security_mode,
            security_policy = %endpoint.security_policy_name(),
            security_level = endpoint.security_level,
            auth_mode = %auth_mode,
            "Selected endpoint"
        );

        let client_identity = cancellable(
            cancel,
            "provision",
            self.identity_provider.provision(&self.config.identity_hint),
        )
        .await
        .map_err(at(ConnectStep::Provision))?;

        let options = self
            .assemble_options(endpoint, client_identity)
            .map_err(at(ConnectStep::AssembleOptions))?;

        tracing::info!(
            endpoint = %options.endpoint.endpoint_url,
            application_uri = %options.client_identity.application_uri,
            "Opening session"
        );
        cancellable(cancel, "open_session", self.transport.open_session(options))
            .await
            .map_err(at(ConnectStep::Open))
    }

    fn assemble_options(
        &self,
        endpoint: EndpointDescription,
        client_identity: ClientIdentity,
    ) -> OpcUaResult<SessionOptions> {
        let identity = self.config.user_identity();
        let policy = endpoint
            .token_policy(identity.auth_mode().token_kind())
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::no_suitable_endpoint(
                    &endpoint.endpoint_url,
                    identity.auth_mode().to_string(),
                ))
            })?;

        Ok(SessionOptions {
            user_token_policy_id: policy.policy_id.clone(),
            endpoint,
            identity,
            client_identity,
            application_name: self.config.application_name.clone(),
            session_timeout: self.config.session_timeout,
        })
    }

    /// Returns a handle to the live session.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if there is no session.
    pub async fn session(&self) -> OpcUaResult<Arc<dyn UaSession>> {
        self.slot
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(OpcUaError::not_connected)
    }

    /// Closes the session if one is live.
    ///
    /// The state is `Disconnected` afterwards even if the server-side close
    /// fails or `cancel` fires first. A cancelled close abandons the session.
    pub async fn close(&self, cancel: &CancellationToken) -> OpcUaResult<()> {
        let mut slot = self.slot.lock().await;
        let Some(session) = slot.take() else {
            return Ok(());
        };
        self.stats.record_close();
        self.set_state(SessionState::Disconnected);

        let result = cancellable(cancel, "close", session.close()).await;
        match &result {
            Err(e) if e.is_cancelled() => {
                tracing::warn!(endpoint = %session.endpoint_url(), "Session close abandoned")
            }
            _ => tracing::info!(endpoint = %session.endpoint_url(), "OPC UA session closed"),
        }
        result
    }

    /// Tears down `session` after a fatal status, if it is still the live one.
    ///
    /// Returns `true` if the session was closed. A handle from an earlier
    /// connection is ignored, so a stale caller cannot close a newer session.
    pub async fn invalidate(&self, session: &Arc<dyn UaSession>, status_code: u32) -> bool {
        let mut slot = self.slot.lock().await;
        let is_current = slot
            .as_ref()
            .is_some_and(|current| same_session(current, session));
        if !is_current {
            tracing::debug!(
                status = status::status_code_name(status_code),
                "Ignoring invalidation of a stale session"
            );
            return false;
        }

        tracing::warn!(
            endpoint = %session.endpoint_url(),
            status = status::status_code_name(status_code),
            status_code,
            "Closing session after fatal error"
        );

        *slot = None;
        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "Close after fatal error failed");
        }
        self.stats.record_invalidation();
        self.set_state(SessionState::Disconnected);
        true
    }

    fn set_state(&self, new_state: SessionState) {
        set_state(&self.state, new_state);
    }
}

fn set_state(state: &watch::Sender<SessionState>, new_state: SessionState) {
    state.send_if_modified(|current| {
        if *current == new_state {
            return false;
        }
        tracing::trace!(old_state = %current, new_state = %new_state, "Session state changed");
        *current = new_state;
        true
    });
}

fn same_session(a: &Arc<dyn UaSession>, b: &Arc<dyn UaSession>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

/// Resets `Connecting` to `Disconnected` if the connect future is dropped or fails.
struct ConnectingGuard<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            set_state(self.state, SessionState::Disconnected);
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.config.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Statistics for session operations.
#[derive(Debug, Default)]
pub struct SessionStats {
    connects: AtomicU64,
    failures: AtomicU64,
    closes: AtomicU64,
    invalidations: AtomicU64,
}

impl SessionStats {
    /// Creates new session statistics.
    pub fn new() -> Self {
        Self::default()
    }

    fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of sessions established.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connect attempts.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns the number of explicit closes.
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }

    /// Returns the number of sessions torn down after fatal errors.
    pub fn invalidations(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
