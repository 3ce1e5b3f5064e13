//! worldgrid-state — persistence for a WorldGrid world server.
//!
//! Backed by [redb](https://docs.rs/redb). Every record belongs to an
//! entity type that must be declared in the [`MappingRegistry`] before the
//! store will read or write it: the registry is populated and frozen during
//! startup, then installed on the [`StateStore`].
//!
//! # Architecture
//!
//! All records are JSON-serialized into a single redb table keyed by
//! `{entity_type}/{key}`, so per-entity prefix scans stay cheap.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod entities;
pub mod error;
pub mod init;
pub mod mapping;
pub mod store;
pub mod tables;

pub use entities::{register_world_mappings, WorldSnapshot, WorldSnapshotMapping, WorldSnapshotRecord};
pub use error::{MappingError, StateError, StateResult};
pub use init::{InMemoryInitializer, PersistenceInitializer, RedbInitializer};
pub use mapping::{EntityMapping, FrozenMappings, MappingDescriptor, MappingRegistry};
pub use store::StateStore;
