//! Cluster registration error types.

use std::time::Duration;

use thiserror::Error;

/// Failures talking to the coordination service.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("invalid coordination endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("coordination service unreachable: {0}")]
    Transport(String),

    #[error("coordination service returned {code:?}: {message}")]
    Status {
        code: tonic::Code,
        message: String,
    },
}

impl From<tonic::Status> for CoordinationError {
    fn from(status: tonic::Status) -> Self {
        Self::Status {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Outcome classification for register/deregister calls.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The hub answered but assigned no channel.
    #[error("coordination service assigned no channel to server group {server_group}")]
    Absent { server_group: String },

    #[error(transparent)]
    Transport(#[from] CoordinationError),

    #[error("coordination call timed out after {0:?}")]
    Timeout(Duration),
}

impl RegistrationError {
    /// True for faults where the hub could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}
