//! redb table definitions for the WorldGrid state store.

use redb::TableDefinition;

/// Entity records keyed by `{entity_type}/{key}`, JSON values.
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Composite key for a record.
pub fn record_key(entity_type: &str, key: &str) -> String {
    format!("{entity_type}/{key}")
}
