//! Ledger store boundary.
//!
//! Holds `(owner, component, location) -> quantity` rows together with the
//! audit trail, and exposes the atomic primitives every movement is built
//! from. Multi-step movements run inside one [`LedgerStore::transaction`].

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerOps, LedgerStore};

use quartermaster_core::{DomainError, EntryId, UserId};
use quartermaster_inventory::{InventoryEntry, InventoryLogEntry};

use crate::error::ServiceResult;

/// Ledger backend chosen at startup.
#[derive(Debug)]
pub enum LedgerBackend {
    InMemory(InMemoryLedgerStore),
    Postgres(PostgresLedgerStore),
}

impl LedgerStore for LedgerBackend {
    fn transaction<T, F>(&self, work: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut dyn LedgerOps) -> ServiceResult<T>,
    {
        match self {
            LedgerBackend::InMemory(store) => store.transaction(work),
            LedgerBackend::Postgres(store) => store.transaction(work),
        }
    }

    fn entry(&self, id: EntryId) -> ServiceResult<Option<InventoryEntry>> {
        match self {
            LedgerBackend::InMemory(store) => store.entry(id),
            LedgerBackend::Postgres(store) => store.entry(id),
        }
    }

    fn entries_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        match self {
            LedgerBackend::InMemory(store) => store.entries_for_owner(owner_id),
            LedgerBackend::Postgres(store) => store.entries_for_owner(owner_id),
        }
    }

    fn all_entries(&self) -> ServiceResult<Vec<InventoryEntry>> {
        match self {
            LedgerBackend::InMemory(store) => store.all_entries(),
            LedgerBackend::Postgres(store) => store.all_entries(),
        }
    }

    fn history(&self, user_id: UserId) -> ServiceResult<Vec<InventoryLogEntry>> {
        match self {
            LedgerBackend::InMemory(store) => store.history(user_id),
            LedgerBackend::Postgres(store) => store.history(user_id),
        }
    }
}

/// Sum quantities, failing instead of wrapping.
pub(crate) fn checked_sum(quantities: impl IntoIterator<Item = i64>) -> ServiceResult<i64> {
    quantities
        .into_iter()
        .try_fold(0i64, i64::checked_add)
        .ok_or_else(|| DomainError::validation("total quantity does not fit in a 64-bit count").into())
}
