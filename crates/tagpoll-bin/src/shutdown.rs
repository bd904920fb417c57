// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! OS signals (SIGTERM, SIGINT) and manual requests are broadcast to
//! subscribers and bridged into a [`CancellationToken`] for the connector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown.
///
/// # Example
///
/// ```ignore
/// use tagpoll_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new();
/// let cancel = coordinator.cancellation_token();
///
/// driver.connect(&cancel).await?;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Initiates shutdown. Idempotent.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for SIGTERM or SIGINT (Ctrl+C elsewhere), then initiates shutdown.
    ///
    /// If the handlers cannot be registered this never resolves; manual
    /// shutdown still works.
    pub async fn wait_for_os_signal(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!(error = %e, "Failed to register signal handlers");
                        return std::future::pending().await;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to register Ctrl+C handler");
                return std::future::pending().await;
            }
            info!("Received Ctrl+C");
        }

        self.initiate_shutdown();
    }

    /// Returns a token cancelled when shutdown is initiated.
    ///
    /// Spawns the signal listener; must be called inside a runtime.
    pub fn cancellation_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if self.is_shutdown_initiated() {
            token.cancel();
            return token;
        }

        let child = token.clone();
        let coordinator = self.clone();
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = coordinator.wait_for_os_signal() => {}
                _ = receiver.recv() => {}
                _ = child.cancelled() => return,
            }
            child.cancel();
        });

        token
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_initiated());
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_token_cancelled_on_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.cancellation_token();
        assert!(!token.is_cancelled());

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should be cancelled");
    }

    #[tokio::test]
    async fn test_token_after_shutdown_is_cancelled() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        assert!(coordinator.cancellation_token().is_cancelled());
    }
}
