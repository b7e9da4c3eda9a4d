use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use quartermaster_core::{ComponentId, DomainError, EntryId, LocationId, UserId, ensure_positive};
use quartermaster_inventory::{InventoryEntry, InventoryLogEntry, LedgerKey};

use super::checked_sum;
use super::r#trait::{LedgerOps, LedgerStore};
use crate::audit_log::AuditLog;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Default)]
struct LedgerState {
    rows: HashMap<EntryId, InventoryEntry>,
    index: BTreeMap<LedgerKey, EntryId>,
    audit: AuditLog,
}

impl LedgerState {
    fn by_key(&self, key: &LedgerKey) -> Option<&InventoryEntry> {
        self.index.get(key).and_then(|id| self.rows.get(id))
    }

    fn put(&mut self, entry: InventoryEntry) {
        self.index.insert(entry.key(), entry.id);
        self.rows.insert(entry.id, entry);
    }

    fn take(&mut self, id: EntryId) -> Option<InventoryEntry> {
        let entry = self.rows.remove(&id)?;
        self.index.remove(&entry.key());
        Some(entry)
    }

    fn owned_by(&self, owner_id: UserId) -> Vec<InventoryEntry> {
        self.index
            .iter()
            .filter(|(key, _)| key.owner_id == owner_id)
            .filter_map(|(_, id)| self.rows.get(id).cloned())
            .collect()
    }
}

/// Transaction over the locked state with an undo log.
///
/// `touched` keeps the first-seen version of every row this transaction
/// wrote (`None` for rows it created), which is all rollback needs.
struct InMemoryTx<'a> {
    state: &'a mut LedgerState,
    touched: HashMap<EntryId, Option<InventoryEntry>>,
    pending_log: Vec<InventoryLogEntry>,
    now: DateTime<Utc>,
}

impl<'a> InMemoryTx<'a> {
    fn begin(state: &'a mut LedgerState) -> Self {
        Self {
            state,
            touched: HashMap::new(),
            pending_log: Vec::new(),
            now: Utc::now(),
        }
    }

    fn touch(&mut self, id: EntryId) {
        if !self.touched.contains_key(&id) {
            let prior = self.state.rows.get(&id).cloned();
            self.touched.insert(id, prior);
        }
    }

    fn commit(self) {
        self.state.audit.append(self.pending_log);
    }

    fn rollback(self) {
        let InMemoryTx { state, touched, .. } = self;
        // Clear every touched row first: a restored row may reclaim a key
        // that another touched row holds right now.
        for id in touched.keys() {
            state.take(*id);
        }
        for prior in touched.into_values().flatten() {
            state.put(prior);
        }
    }
}

impl LedgerOps for InMemoryTx<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn quantity(&mut self, key: &LedgerKey) -> ServiceResult<i64> {
        Ok(self.state.by_key(key).map(|e| e.quantity).unwrap_or(0))
    }

    fn total_for(&mut self, owner_id: UserId, component_id: ComponentId) -> ServiceResult<i64> {
        checked_sum(
            self.state
                .index
                .iter()
                .filter(|(key, _)| key.owner_id == owner_id && key.component_id == component_id)
                .filter_map(|(_, id)| self.state.rows.get(id))
                .map(|e| e.quantity),
        )
    }

    fn entry(&mut self, id: EntryId) -> ServiceResult<Option<InventoryEntry>> {
        Ok(self.state.rows.get(&id).cloned())
    }

    fn entries_for_owner(&mut self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        Ok(self.state.owned_by(owner_id))
    }

    fn increment(&mut self, key: LedgerKey, delta: i64) -> ServiceResult<InventoryEntry> {
        ensure_positive(delta, "quantity")?;

        let entry = match self.state.by_key(&key).cloned() {
            Some(mut existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(delta)
                    .ok_or_else(|| DomainError::validation("quantity overflow"))?;
                existing.updated_at = self.now;
                existing
            }
            None => InventoryEntry {
                id: EntryId::new(),
                owner_id: key.owner_id,
                component_id: key.component_id,
                location_id: key.location_id,
                quantity: delta,
                updated_at: self.now,
            },
        };

        self.touch(entry.id);
        self.state.put(entry.clone());
        Ok(entry)
    }

    fn decrement(&mut self, key: LedgerKey, delta: i64) -> ServiceResult<i64> {
        ensure_positive(delta, "quantity")?;

        let Some(mut existing) = self.state.by_key(&key).cloned() else {
            return Err(DomainError::insufficient_stock(delta, 0).into());
        };
        if existing.quantity < delta {
            return Err(DomainError::insufficient_stock(delta, existing.quantity).into());
        }

        self.touch(existing.id);
        existing.quantity -= delta;
        if existing.quantity == 0 {
            self.state.take(existing.id);
            return Ok(0);
        }
        existing.updated_at = self.now;
        let remaining = existing.quantity;
        self.state.put(existing);
        Ok(remaining)
    }

    fn move_within_owner(
        &mut self,
        key: LedgerKey,
        to: Option<LocationId>,
        quantity: i64,
    ) -> ServiceResult<InventoryEntry> {
        ensure_positive(quantity, "quantity")?;

        let Some(source) = self.state.by_key(&key).cloned() else {
            return Err(DomainError::insufficient_stock(quantity, 0).into());
        };
        if source.quantity < quantity {
            return Err(DomainError::insufficient_stock(quantity, source.quantity).into());
        }
        if key.location_id == to {
            return Ok(source);
        }

        let destination = key.at(to);
        if source.quantity == quantity && self.state.by_key(&destination).is_none() {
            self.touch(source.id);
            let mut moved = self.state.take(source.id).unwrap_or(source);
            moved.location_id = to;
            moved.updated_at = self.now;
            self.state.put(moved.clone());
            return Ok(moved);
        }

        self.decrement(key, quantity)?;
        self.increment(destination, quantity)
    }

    fn record(&mut self, entry: InventoryLogEntry) {
        self.pending_log.push(entry);
    }
}

/// In-memory ledger store.
///
/// One write lock serializes transactions, which gives the same isolation a
/// relational backend would with row locks taken in [`LedgerKey`] order.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn transaction<T, F>(&self, work: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut dyn LedgerOps) -> ServiceResult<T>,
    {
        let mut state = self
            .state
            .write()
            .map_err(|_| ServiceError::poisoned("ledger"))?;

        let mut tx = InMemoryTx::begin(&mut state);
        match work(&mut tx) {
            Ok(value) => {
                tx.commit();
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    fn entry(&self, id: EntryId) -> ServiceResult<Option<InventoryEntry>> {
        let state = self.state.read().map_err(|_| ServiceError::poisoned("ledger"))?;
        Ok(state.rows.get(&id).cloned())
    }

    fn entries_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        let state = self.state.read().map_err(|_| ServiceError::poisoned("ledger"))?;
        Ok(state.owned_by(owner_id))
    }

    fn all_entries(&self) -> ServiceResult<Vec<InventoryEntry>> {
        let state = self.state.read().map_err(|_| ServiceError::poisoned("ledger"))?;
        Ok(state
            .index
            .values()
            .filter_map(|id| state.rows.get(id).cloned())
            .collect())
    }

    fn history(&self, user_id: UserId) -> ServiceResult<Vec<InventoryLogEntry>> {
        let state = self.state.read().map_err(|_| ServiceError::poisoned("ledger"))?;
        Ok(state.audit.for_user(user_id))
    }
}
