use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quartermaster_core::{ComponentId, UserId};

/// Kind of stock movement recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Add,
    Remove,
    Loot,
    TransferIn,
    TransferOut,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Add => "add",
            LogAction::Remove => "remove",
            LogAction::Loot => "loot",
            LogAction::TransferIn => "transfer_in",
            LogAction::TransferOut => "transfer_out",
        }
    }
}

/// Immutable audit record of a real stock movement for one user.
///
/// `quantity_before`/`quantity_after` are the user's total holdings of the
/// component across all locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    pub user_id: UserId,
    pub component_id: ComponentId,
    pub action: LogAction,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub related_user_id: Option<UserId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl InventoryLogEntry {
    pub fn new(
        user_id: UserId,
        component_id: ComponentId,
        action: LogAction,
        quantity_before: i64,
        quantity_after: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            component_id,
            action,
            quantity: (quantity_after - quantity_before).abs(),
            quantity_before,
            quantity_after,
            related_user_id: None,
            notes: None,
            created_at,
        }
    }

    pub fn with_related(mut self, user_id: UserId) -> Self {
        self.related_user_id = Some(user_id);
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}
