// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Writes made inside a transaction are buffered as Changes and applied in
// order at commit. Rollback simply discards them.
//
// ============================================================================

use crate::core::Property;
use crate::storage::EntityKey;

/// A buffered full replacement of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    key: EntityKey,
    properties: Vec<Property>,
}

impl Change {
    pub fn put(key: EntityKey, properties: Vec<Property>) -> Self {
        Self { key, properties }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn into_parts(self) -> (EntityKey, Vec<Property>) {
        (self.key, self.properties)
    }
}
