use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quartermaster_core::{ComponentId, Entity, EntryId, LocationId, UserId};

/// Unique key of a ledger row.
///
/// Field order defines the global lock/visit order used by multi-key
/// operations: owner, then component, then location (unlocated first).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerKey {
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub location_id: Option<LocationId>,
}

impl LedgerKey {
    pub fn new(owner_id: UserId, component_id: ComponentId, location_id: Option<LocationId>) -> Self {
        Self {
            owner_id,
            component_id,
            location_id,
        }
    }

    pub fn at(self, location_id: Option<LocationId>) -> Self {
        Self {
            location_id,
            ..self
        }
    }
}

/// How much of one component one user holds at one location.
///
/// Rows with quantity 0 do not exist; the store removes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub id: EntryId,
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub location_id: Option<LocationId>,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryEntry {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.owner_id, self.component_id, self.location_id)
    }
}

impl Entity for InventoryEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
