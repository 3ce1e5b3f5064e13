//! StateStore — redb-backed record persistence for a world server.
//!
//! Records are addressed by entity type and key. The store refuses every
//! record operation until a [`FrozenMappings`] set has been installed, and
//! refuses entity types the set does not declare. The store supports both
//! on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::mapping::{EntityMapping, FrozenMappings};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    mappings: Option<FrozenMappings>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("mappings", &self.mappings.as_ref().map(FrozenMappings::len))
            .finish()
    }
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            mappings: None,
        };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            mappings: None,
        };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RECORDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Install the frozen mapping set. Record access is refused until then.
    pub fn with_mappings(mut self, mappings: FrozenMappings) -> Self {
        debug!(count = mappings.len(), "entity mappings installed");
        self.mappings = Some(mappings);
        self
    }

    pub fn mappings(&self) -> Option<&FrozenMappings> {
        self.mappings.as_ref()
    }

    fn check_entity(&self, entity_type: &str) -> StateResult<&FrozenMappings> {
        let mappings = self.mappings.as_ref().ok_or(StateError::MappingsNotInstalled)?;
        if !mappings.contains(entity_type) {
            return Err(StateError::Unmapped {
                entity_type: entity_type.to_string(),
                domain_type: "<none>".to_string(),
            });
        }
        Ok(mappings)
    }

    fn check_mapping<M: EntityMapping>(&self) -> StateResult<()> {
        let mappings = self.check_entity(M::ENTITY_TYPE)?;
        if !mappings.allows(M::ENTITY_TYPE, M::DOMAIN_TYPE) {
            return Err(StateError::Unmapped {
                entity_type: M::ENTITY_TYPE.to_string(),
                domain_type: M::DOMAIN_TYPE.to_string(),
            });
        }
        Ok(())
    }

    // ── Records ────────────────────────────────────────────────────

    /// Insert or update a domain object under `key`.
    pub fn put_domain<M: EntityMapping>(&self, key: &str, domain: &M::Domain) -> StateResult<()> {
        self.check_mapping::<M>()?;
        let record_key = record_key(M::ENTITY_TYPE, key);
        let entity = M::to_entity(domain);
        let value = serde_json::to_vec(&entity).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            table
                .insert(record_key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %record_key, "record stored");
        Ok(())
    }

    /// Load a domain object by key.
    pub fn get_domain<M: EntityMapping>(&self, key: &str) -> StateResult<Option<M::Domain>> {
        self.check_mapping::<M>()?;
        let record_key = record_key(M::ENTITY_TYPE, key);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        match table.get(record_key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let entity: M::Entity =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(M::to_domain(entity)))
            }
            None => Ok(None),
        }
    }

    /// Delete a record. Returns true if it existed.
    pub fn delete_record(&self, entity_type: &str, key: &str) -> StateResult<bool> {
        self.check_entity(entity_type)?;
        let record_key = record_key(entity_type, key);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            existed = table
                .remove(record_key.as_str())
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(key = %record_key, existed, "record deleted");
        Ok(existed)
    }

    /// Number of stored records of one entity type.
    pub fn count_records(&self, entity_type: &str) -> StateResult<usize> {
        self.check_entity(entity_type)?;
        let prefix = format!("{entity_type}/");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        let mut count = 0;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                count += 1;
            }
        }
        Ok(count)
    }
}
