//! Entity ↔ domain mapping registry.
//!
//! Declares, once per entity type, which in-memory domain type a persisted
//! record maps to. The registry is append-only while startup populates it;
//! [`MappingRegistry::freeze`] hands out a read-only [`FrozenMappings`] that
//! the [`StateStore`](crate::StateStore) consults on every access.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MappingError;

/// One declared correspondence between a record shape and a domain shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDescriptor {
    pub entity_type: String,
    pub domain_type: String,
}

impl MappingDescriptor {
    pub fn new(entity_type: impl Into<String>, domain_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            domain_type: domain_type.into(),
        }
    }
}

/// Bidirectional transform between a persisted record and its domain object.
pub trait EntityMapping: 'static {
    /// Record shape as stored.
    type Entity: Serialize + DeserializeOwned;
    /// In-memory shape handed to game code.
    type Domain;

    const ENTITY_TYPE: &'static str;
    const DOMAIN_TYPE: &'static str;

    fn to_domain(entity: Self::Entity) -> Self::Domain;
    fn to_entity(domain: &Self::Domain) -> Self::Entity;

    fn descriptor() -> MappingDescriptor {
        MappingDescriptor::new(Self::ENTITY_TYPE, Self::DOMAIN_TYPE)
    }
}

/// Startup-time registry of mapping descriptors.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    descriptors: BTreeMap<String, MappingDescriptor>,
    frozen: bool,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that records of `entity_type` map to `domain_type`.
    ///
    /// Registering an identical pair again is a no-op.
    pub fn register(
        &mut self,
        entity_type: &str,
        domain_type: &str,
    ) -> Result<(), MappingError> {
        if self.frozen {
            return Err(MappingError::RegistryFrozen {
                entity_type: entity_type.to_string(),
            });
        }

        if let Some(existing) = self.descriptors.get(entity_type) {
            if existing.domain_type == domain_type {
                return Ok(());
            }
            return Err(MappingError::DuplicateMapping {
                entity_type: entity_type.to_string(),
                existing: existing.domain_type.clone(),
                requested: domain_type.to_string(),
            });
        }

        self.descriptors.insert(
            entity_type.to_string(),
            MappingDescriptor::new(entity_type, domain_type),
        );
        debug!(%entity_type, %domain_type, "mapping registered");
        Ok(())
    }

    pub fn register_mapping<M: EntityMapping>(&mut self) -> Result<(), MappingError> {
        self.register(M::ENTITY_TYPE, M::DOMAIN_TYPE)
    }

    /// Finalize the set. Later `register` calls fail with `RegistryFrozen`.
    pub fn freeze(&mut self) -> FrozenMappings {
        self.frozen = true;
        FrozenMappings {
            descriptors: Arc::new(self.descriptors.clone()),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Read-only view of the registry, shared with the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenMappings {
    descriptors: Arc<BTreeMap<String, MappingDescriptor>>,
}

impl FrozenMappings {
    pub fn domain_type_of(&self, entity_type: &str) -> Option<&str> {
        self.descriptors
            .get(entity_type)
            .map(|d| d.domain_type.as_str())
    }

    /// True if `entity_type` is mapped to exactly `domain_type`.
    pub fn allows(&self, entity_type: &str, domain_type: &str) -> bool {
        self.domain_type_of(entity_type) == Some(domain_type)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.descriptors.contains_key(entity_type)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappingDescriptor> {
        self.descriptors.values()
    }
}
