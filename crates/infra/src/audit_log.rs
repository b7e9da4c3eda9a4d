//! Append-only audit trail of real stock movements.
//!
//! There is no update or delete API. Entries are appended as part of the
//! ledger transaction that caused them (see [`crate::ledger_store`]), so a
//! movement and its log rows are committed together or not at all.

use quartermaster_core::UserId;
use quartermaster_inventory::InventoryLogEntry;

#[derive(Debug, Default, Clone)]
pub struct AuditLog {
    entries: Vec<InventoryLogEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entries: impl IntoIterator<Item = InventoryLogEntry>) {
        self.entries.extend(entries);
    }

    /// All entries recorded for `user_id`, newest first.
    pub fn for_user(&self, user_id: UserId) -> Vec<InventoryLogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quartermaster_core::ComponentId;
    use quartermaster_inventory::LogAction;

    #[test]
    fn history_is_per_user_and_newest_first() {
        let alice = UserId::new();
        let bob = UserId::new();
        let component = ComponentId::new();

        let mut log = AuditLog::new();
        log.append([
            InventoryLogEntry::new(alice, component, LogAction::Add, 0, 5, Utc::now()),
            InventoryLogEntry::new(bob, component, LogAction::Add, 0, 1, Utc::now()),
            InventoryLogEntry::new(alice, component, LogAction::Remove, 5, 2, Utc::now()),
        ]);

        let history = log.for_user(alice);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, LogAction::Remove);
        assert_eq!(history[0].quantity, 3);
        assert_eq!(history[1].action, LogAction::Add);
        assert_eq!(log.len(), 3);
    }
}
