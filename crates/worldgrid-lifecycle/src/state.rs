//! Process lifecycle state machine.
//!
//! ```text
//! INIT -> CONFIG_LOADED -> DB_READY -> MAPPINGS_FROZEN -> LISTENING -> REGISTERED -> RUNNING
//! RUNNING -> SHUTTING_DOWN -> TERMINATED
//! any state before RUNNING -> FAILED
//! ```
//!
//! [`LifecycleTracker`] publishes the current state on a watch channel and
//! keeps the full history for diagnostics and tests.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::info;

use crate::error::{LifecycleError, LifecycleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Init,
    ConfigLoaded,
    DbReady,
    MappingsFrozen,
    Listening,
    Registered,
    Running,
    ShuttingDown,
    Terminated,
    Failed,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::ConfigLoaded => "CONFIG_LOADED",
            Self::DbReady => "DB_READY",
            Self::MappingsFrozen => "MAPPINGS_FROZEN",
            Self::Listening => "LISTENING",
            Self::Registered => "REGISTERED",
            Self::Running => "RUNNING",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Terminated => "TERMINATED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Init, ConfigLoaded)
            | (ConfigLoaded, DbReady)
            | (DbReady, MappingsFrozen)
            | (MappingsFrozen, Listening)
            | (Listening, Registered)
            | (Registered, Running)
            | (Running, ShuttingDown)
            | (ShuttingDown, Terminated) => true,
            (Init | ConfigLoaded | DbReady | MappingsFrozen | Listening | Registered, Failed) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, observable lifecycle state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    tx: Arc<watch::Sender<LifecycleState>>,
    history: Arc<Mutex<Vec<LifecycleState>>>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Init);
        Self {
            tx: Arc::new(tx),
            history: Arc::new(Mutex::new(vec![LifecycleState::Init])),
        }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Every state entered so far, oldest first.
    pub fn history(&self) -> Vec<LifecycleState> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn transition(&self, next: LifecycleState) -> LifecycleResult<()> {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition { from, to: next });
        }
        history.push(next);
        self.tx.send_replace(next);
        info!(from = %from, to = %next, "lifecycle transition");
        Ok(())
    }

    /// Move to FAILED from wherever startup stopped.
    pub fn fail(&self) {
        if let Err(e) = self.transition(LifecycleState::Failed) {
            tracing::warn!(error = %e, "could not mark lifecycle as failed");
        }
    }
}
