//! Graceful shutdown sequence.
//!
//! Always the same steps in the same order, whatever the trigger:
//!
//! 1. broadcast the shutdown countdown to every session
//! 2. save world state
//! 3. deregister from the coordination service
//! 4. hold for the grace delay
//!
//! Steps 1 to 3 are best-effort: a failure is logged and the sequence moves
//! on. The grace delay is a plain sleep and cannot be cut short.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};
use world_core::messages::SHUTDOWN_SEC;
use world_core::{Endpoint, MessageCatalog, ShutdownConfig};
use worldgrid_cluster::{ClusterRegistrationClient, CoordinationService};

use crate::signals::TerminationKind;
use crate::state::{LifecycleState, LifecycleTracker};
use crate::world::WorldServices;

/// What the shutdown sequence announces and how long it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSettings {
    pub countdown_secs: u32,
    pub grace: Duration,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self::from(&ShutdownConfig::default())
    }
}

impl From<&ShutdownConfig> for ShutdownSettings {
    fn from(config: &ShutdownConfig) -> Self {
        Self {
            countdown_secs: config.countdown_secs,
            grace: config.grace(),
        }
    }
}

/// Result of a completed shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub kind: TerminationKind,
    /// Sessions the countdown was queued to.
    pub notified: usize,
    pub saved: bool,
    pub deregistered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed(ShutdownReport),
    /// Another caller already started the sequence.
    AlreadyInProgress,
}

pub struct ShutdownCoordinator<W, C> {
    world: W,
    registration: Arc<ClusterRegistrationClient<C>>,
    messages: Arc<MessageCatalog>,
    server_group: String,
    endpoint: Endpoint,
    settings: ShutdownSettings,
    lifecycle: LifecycleTracker,
    started: AtomicBool,
}

impl<W: WorldServices, C: CoordinationService> ShutdownCoordinator<W, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        world: W,
        registration: Arc<ClusterRegistrationClient<C>>,
        messages: Arc<MessageCatalog>,
        server_group: impl Into<String>,
        endpoint: Endpoint,
        settings: ShutdownSettings,
        lifecycle: LifecycleTracker,
    ) -> Self {
        Self {
            world,
            registration,
            messages,
            server_group: server_group.into(),
            endpoint,
            settings,
            lifecycle,
            started: AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Run the shutdown sequence. Only the first call does any work.
    pub async fn run(&self, kind: TerminationKind) -> ShutdownOutcome {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(%kind, "shutdown already in progress");
            return ShutdownOutcome::AlreadyInProgress;
        }

        if let Err(e) = self.lifecycle.transition(LifecycleState::ShuttingDown) {
            warn!(error = %e, "shutting down outside of RUNNING");
        }
        info!(%kind, grace = ?self.settings.grace, "shutdown sequence started");

        let announcement = self
            .messages
            .format(SHUTDOWN_SEC, &[&self.settings.countdown_secs]);
        let notified = self.world.broadcast(&announcement).await;
        info!(notified, "shutdown countdown broadcast");

        let saved = match self.world.save_all().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to save world state");
                false
            }
        };

        let deregistered = self
            .registration
            .deregister(&self.server_group, &self.endpoint)
            .await
            .is_ok();

        tokio::time::sleep(self.settings.grace).await;
        info!(%kind, saved, deregistered, "shutdown sequence complete");

        ShutdownOutcome::Completed(ShutdownReport {
            kind,
            notified,
            saved,
            deregistered,
        })
    }
}
