//! Coordinated shutdown: notify every attached client, then stop.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::gateway::events::ChatEvent;
use crate::gateway::hub::Hub;

/// Coordinates shutdown through one root cancellation token, observed by the
/// listener and (via child tokens) by every attached stream.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// The root token. Streams derive per-connection child tokens from it.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive the shutdown sequence:
    ///
    /// 1. publish the shutdown notice,
    /// 2. close the intake queue,
    /// 3. wait for the dispatch loop to drain (the notice is now in every
    ///    registered outbox),
    /// 4. cancel the root token so the listener stops accepting and attached
    ///    streams finish.
    pub async fn begin(&self, hub: &Hub, dispatch: JoinHandle<()>) {
        if hub.publish(ChatEvent::Shutdown).await.is_err() {
            info!("intake already closed, skipping shutdown notice");
        }
        hub.close_intake().await;
        if let Err(e) = dispatch.await {
            error!(error = %e, "dispatch loop task failed");
        }
        self.token.cancel();
    }
}

/// Wait for SIGINT or SIGTERM, then drive the shutdown sequence.
pub async fn watch(coordinator: ShutdownCoordinator, hub: Arc<Hub>, dispatch: JoinHandle<()>) {
    wait_for_signal().await;
    info!("shutdown signal received, notifying attached clients");
    coordinator.begin(&hub, dispatch).await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}
