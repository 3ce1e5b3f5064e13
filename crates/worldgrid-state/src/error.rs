//! Error types for the WorldGrid state store and mapping registry.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("entity mappings have not been installed on the store")]
    MappingsNotInstalled,

    #[error("no mapping registered for entity type {entity_type} -> {domain_type}")]
    Unmapped {
        entity_type: String,
        domain_type: String,
    },
}

/// Errors raised while populating the mapping registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("entity type {entity_type} already maps to {existing}, cannot map to {requested}")]
    DuplicateMapping {
        entity_type: String,
        existing: String,
        requested: String,
    },

    #[error("mapping registry is frozen, cannot register {entity_type}")]
    RegistryFrozen { entity_type: String },
}
