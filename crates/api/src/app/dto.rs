use serde::Deserialize;

use quartermaster_core::{ComponentId, EntryId, LocationId, UserId};
use quartermaster_infra::movement::StockSource;

// -------------------------
// Inventory bodies
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddStockBody {
    pub component_id: ComponentId,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub quantity: i64,
    #[serde(default)]
    pub source: StockSource,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveStockBody {
    pub component_id: ComponentId,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub to_owner_id: UserId,
    pub component_id: ComponentId,
    pub quantity: i64,
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `quantity` unset moves the whole entry.
#[derive(Debug, Deserialize)]
pub struct MoveEntryBody {
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMoveBody {
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
}

#[derive(Debug, Deserialize)]
pub struct PatchResetBody {
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub kept_entry_ids: Vec<EntryId>,
}

// -------------------------
// Request bodies
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub pioneer_comment: Option<String>,
    #[serde(default)]
    pub public_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}
