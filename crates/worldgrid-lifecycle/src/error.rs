//! Lifecycle error types.

use thiserror::Error;
use world_core::ConfigError;
use worldgrid_cluster::RegistrationError;
use worldgrid_net::NetError;
use worldgrid_state::{MappingError, StateError};

use crate::state::LifecycleState;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("persistence initialization failed: {0}")]
    PersistenceInit(#[source] StateError),

    #[error("entity mapping registration failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("listener could not bind: {0}")]
    FatalBind(#[from] NetError),

    #[error("cluster registration failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error("failed to subscribe to termination signals: {0}")]
    SignalSetup(#[source] std::io::Error),

    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

impl LifecycleError {
    /// Process exit code for a startup that ended in this error.
    ///
    /// A persistence failure is an orderly abort, everything else that stops
    /// the node before RUNNING is a failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::PersistenceInit(_) => 0,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_failure_exits_cleanly() {
        let err = LifecycleError::PersistenceInit(StateError::Open("disk gone".into()));
        assert_eq!(err.exit_code(), 0);
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn bind_failure_exits_with_one() {
        let err = LifecycleError::FatalBind(NetError::PortRangeExhausted { start: 65535 });
        assert_eq!(err.exit_code(), 1);
    }
}
