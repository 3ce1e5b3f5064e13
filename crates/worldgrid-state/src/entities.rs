//! World entity catalogue.
//!
//! The full set of record types a world server reads and writes. Game
//! logic owns the domain types; this crate only declares the mappings and
//! implements the world snapshot written on shutdown.

use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::mapping::{EntityMapping, MappingRegistry};

/// `(entity_type, domain_type)` pairs owned by game logic.
pub const WORLD_ENTITIES: &[(&str, &str)] = &[
    ("account", "Account"),
    ("cellon_option", "CellonOption"),
    ("character", "Character"),
    ("character_relation", "CharacterRelation"),
    ("character_skill", "CharacterSkill"),
    ("combo", "Combo"),
    ("drop", "Drop"),
    ("general_log", "GeneralLog"),
    ("item", "Item"),
    ("item_instance", "ItemInstance"),
    ("mail", "Mail"),
    ("map", "Map"),
    ("map_monster", "MapMonster"),
    ("map_npc", "MapNpc"),
    ("family", "Family"),
    ("family_character", "FamilyCharacter"),
    ("family_log", "FamilyLog"),
    ("map_type", "MapType"),
    ("map_type_map", "MapTypeMap"),
    ("npc_monster", "NpcMonster"),
    ("npc_monster_skill", "NpcMonsterSkill"),
    ("penalty_log", "PenaltyLog"),
    ("portal", "Portal"),
    ("quicklist_entry", "QuicklistEntry"),
    ("recipe", "Recipe"),
    ("recipe_item", "RecipeItem"),
    ("respawn", "Respawn"),
    ("respawn_map_type", "RespawnMapType"),
    ("shop", "Shop"),
    ("shop_item", "ShopItem"),
    ("shop_skill", "ShopSkill"),
    ("skill", "Skill"),
    ("teleporter", "Teleporter"),
];

/// Register every world entity plus the world snapshot.
pub fn register_world_mappings(registry: &mut MappingRegistry) -> Result<(), MappingError> {
    for (entity_type, domain_type) in WORLD_ENTITIES {
        registry.register(entity_type, domain_type)?;
    }
    registry.register_mapping::<WorldSnapshotMapping>()
}

// ── World snapshot ───────────────────────────────────────────────────

/// Summary of the running world, persisted by the save-all step.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub world_id: String,
    pub server_group: String,
    pub channel_id: Option<i32>,
    pub endpoint: String,
    pub active_sessions: usize,
    pub saved_at: u64,
}

/// Stored shape of a [`WorldSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshotRecord {
    pub world_id: String,
    pub server_group: String,
    /// `-1` when the node never received a channel.
    pub channel_id: i32,
    pub endpoint: String,
    pub active_sessions: u64,
    pub saved_at: u64,
}

pub struct WorldSnapshotMapping;

impl EntityMapping for WorldSnapshotMapping {
    type Entity = WorldSnapshotRecord;
    type Domain = WorldSnapshot;

    const ENTITY_TYPE: &'static str = "world_snapshot";
    const DOMAIN_TYPE: &'static str = "WorldSnapshot";

    fn to_domain(entity: WorldSnapshotRecord) -> WorldSnapshot {
        WorldSnapshot {
            world_id: entity.world_id,
            server_group: entity.server_group,
            channel_id: (entity.channel_id >= 0).then_some(entity.channel_id),
            endpoint: entity.endpoint,
            active_sessions: entity.active_sessions as usize,
            saved_at: entity.saved_at,
        }
    }

    fn to_entity(domain: &WorldSnapshot) -> WorldSnapshotRecord {
        WorldSnapshotRecord {
            world_id: domain.world_id.clone(),
            server_group: domain.server_group.clone(),
            channel_id: domain.channel_id.unwrap_or(-1),
            endpoint: domain.endpoint.clone(),
            active_sessions: domain.active_sessions as u64,
            saved_at: domain.saved_at,
        }
    }
}
