use std::sync::Arc;

use chrono::{DateTime, Utc};

use quartermaster_core::{ComponentId, EntryId, LocationId, UserId};
use quartermaster_inventory::{InventoryEntry, InventoryLogEntry, LedgerKey};

use crate::error::ServiceResult;

/// Operations available inside a ledger transaction.
///
/// Reads observe the transaction's own writes. Any error returned from the
/// transaction body discards every write and every recorded log entry.
pub trait LedgerOps {
    /// Timestamp stamped on every row touched by this transaction.
    fn now(&self) -> DateTime<Utc>;

    /// Quantity at exactly `key` (0 when no row exists).
    fn quantity(&mut self, key: &LedgerKey) -> ServiceResult<i64>;

    /// Total holdings of `component_id` by `owner_id` across all locations.
    ///
    /// Fails with a validation error if the total does not fit in an `i64`.
    fn total_for(&mut self, owner_id: UserId, component_id: ComponentId) -> ServiceResult<i64>;

    fn entry(&mut self, id: EntryId) -> ServiceResult<Option<InventoryEntry>>;

    /// Rows held by `owner_id`, in [`LedgerKey`] order.
    fn entries_for_owner(&mut self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>>;

    /// Add `delta` at `key`, creating the row if needed.
    fn increment(&mut self, key: LedgerKey, delta: i64) -> ServiceResult<InventoryEntry>;

    /// Remove `delta` from `key`, deleting the row when it reaches zero.
    ///
    /// Returns the quantity left at `key`. Fails with `InsufficientStock`
    /// rather than going negative.
    fn decrement(&mut self, key: LedgerKey, delta: i64) -> ServiceResult<i64>;

    /// Move `quantity` from `key` to the same owner/component at `to`.
    ///
    /// Merges into an existing destination row. Moving a whole row to a
    /// location with no row keeps the row's id.
    fn move_within_owner(
        &mut self,
        key: LedgerKey,
        to: Option<LocationId>,
        quantity: i64,
    ) -> ServiceResult<InventoryEntry>;

    /// Queue an audit entry; it is appended only if the transaction commits.
    fn record(&mut self, entry: InventoryLogEntry);
}

/// Transactional `(owner, component, location) -> quantity` store.
pub trait LedgerStore: Send + Sync {
    /// Run `work` as one serializable transaction.
    fn transaction<T, F>(&self, work: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut dyn LedgerOps) -> ServiceResult<T>;

    fn entry(&self, id: EntryId) -> ServiceResult<Option<InventoryEntry>>;

    fn entries_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>>;

    fn all_entries(&self) -> ServiceResult<Vec<InventoryEntry>>;

    /// Audit entries for `user_id`, newest first.
    fn history(&self, user_id: UserId) -> ServiceResult<Vec<InventoryLogEntry>>;

    fn get(&self, key: LedgerKey) -> ServiceResult<i64> {
        self.transaction(|tx| tx.quantity(&key))
    }

    fn increment(&self, key: LedgerKey, delta: i64) -> ServiceResult<InventoryEntry> {
        self.transaction(|tx| tx.increment(key, delta))
    }

    fn decrement(&self, key: LedgerKey, delta: i64) -> ServiceResult<i64> {
        self.transaction(|tx| tx.decrement(key, delta))
    }

    fn move_within_owner(
        &self,
        key: LedgerKey,
        to: Option<LocationId>,
        quantity: i64,
    ) -> ServiceResult<InventoryEntry> {
        self.transaction(|tx| tx.move_within_owner(key, to, quantity))
    }
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn transaction<T, F>(&self, work: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut dyn LedgerOps) -> ServiceResult<T>,
    {
        (**self).transaction(work)
    }

    fn entry(&self, id: EntryId) -> ServiceResult<Option<InventoryEntry>> {
        (**self).entry(id)
    }

    fn entries_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        (**self).entries_for_owner(owner_id)
    }

    fn all_entries(&self) -> ServiceResult<Vec<InventoryEntry>> {
        (**self).all_entries()
    }

    fn history(&self, user_id: UserId) -> ServiceResult<Vec<InventoryLogEntry>> {
        (**self).history(user_id)
    }
}
