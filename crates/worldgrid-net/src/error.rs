//! Network error types.

use thiserror::Error;

/// Errors that can occur while binding or serving connections.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("no free port between {start} and 65535")]
    PortRangeExhausted { start: u16 },

    #[error("gave up after {attempts} bind attempts starting at port {start}")]
    AttemptsExhausted { start: u16, attempts: u32 },

    #[error("malformed packet: {0}")]
    Decrypt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetResult<T> = Result<T, NetError>;
