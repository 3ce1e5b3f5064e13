//! Persistence initialization gate.
//!
//! Startup calls [`PersistenceInitializer::initialize`] exactly once; a
//! failure aborts the bootstrap before any listener or cluster registration
//! exists.

use std::path::PathBuf;

use tracing::info;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;

/// Establishes the database connection for the world server.
pub trait PersistenceInitializer {
    fn initialize(&self) -> StateResult<StateStore>;
}

/// Opens (or creates) a redb file on disk.
#[derive(Debug, Clone)]
pub struct RedbInitializer {
    path: PathBuf,
}

impl RedbInitializer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PersistenceInitializer for RedbInitializer {
    fn initialize(&self) -> StateResult<StateStore> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StateError::Open(format!("create {}: {e}", parent.display()))
            })?;
        }
        let store = StateStore::open(&self.path)?;
        info!(path = ?self.path, "database initialized");
        Ok(store)
    }
}

/// Ephemeral store, for tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryInitializer;

impl PersistenceInitializer for InMemoryInitializer {
    fn initialize(&self) -> StateResult<StateStore> {
        StateStore::open_in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redb_initializer_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/world.redb");

        let store = RedbInitializer::new(&path).initialize().unwrap();
        assert!(path.exists());
        assert!(store.mappings().is_none());
    }

    #[test]
    fn redb_initializer_reports_unusable_path() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let result = RedbInitializer::new(dir.path()).initialize();
        assert!(matches!(result, Err(StateError::Open(_))));
    }

    #[test]
    fn in_memory_initializer() {
        let store = InMemoryInitializer.initialize().unwrap();
        assert!(store.mappings().is_none());
    }
}
