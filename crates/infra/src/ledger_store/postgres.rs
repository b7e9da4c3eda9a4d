//! Postgres-backed ledger store.
//!
//! Every [`LedgerStore::transaction`] is one SERIALIZABLE sqlx transaction.
//! Rows are read with `SELECT … FOR UPDATE`, and multi-row reads lock in
//! [`LedgerKey`] order (owner, component, location with unlocated first), so
//! two movements over the same rows queue instead of interleaving. A
//! serialization failure or a racing insert on the same key surfaces as
//! `DomainError::Conflict`, which callers may retry.
//!
//! Audit entries queued with [`LedgerOps::record`] are inserted just before
//! `COMMIT`, inside the same transaction.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::warn;
use uuid::Uuid;

use quartermaster_core::{ComponentId, DomainError, EntryId, LocationId, UserId, ensure_positive};
use quartermaster_inventory::{InventoryEntry, InventoryLogEntry, LedgerKey};

use super::checked_sum;
use super::r#trait::{LedgerOps, LedgerStore};
use crate::error::{ServiceError, ServiceResult};
use crate::pg::{block_on, decode_error, map_sqlx_error};

struct EntryRow {
    id: Uuid,
    owner_id: Uuid,
    component_id: Uuid,
    location_id: Option<Uuid>,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            component_id: row.try_get("component_id")?,
            location_id: row.try_get("location_id")?,
            quantity: row.try_get("quantity")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<EntryRow> for InventoryEntry {
    fn from(row: EntryRow) -> Self {
        InventoryEntry {
            id: EntryId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            component_id: ComponentId::from_uuid(row.component_id),
            location_id: row.location_id.map(LocationId::from_uuid),
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

fn entry_from_row(row: &PgRow) -> ServiceResult<InventoryEntry> {
    EntryRow::from_row(row)
        .map(InventoryEntry::from)
        .map_err(|e| decode_error("inventory entry row", e))
}

fn entries_from_rows(rows: &[PgRow]) -> ServiceResult<Vec<InventoryEntry>> {
    rows.iter().map(entry_from_row).collect()
}

fn location_uuid(location_id: Option<LocationId>) -> Option<Uuid> {
    location_id.map(Uuid::from)
}

/// One open sqlx transaction plus the audit entries waiting for its commit.
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
    pending_log: Vec<InventoryLogEntry>,
    now: DateTime<Utc>,
}

impl PgLedgerTx {
    fn begin(pool: &PgPool) -> ServiceResult<Self> {
        let tx = block_on(async {
            let mut tx = pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *tx)
                .await?;
            Ok::<_, sqlx::Error>(tx)
        })?
        .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        Ok(Self {
            tx,
            pending_log: Vec::new(),
            now: Utc::now(),
        })
    }

    fn commit(mut self) -> ServiceResult<()> {
        for entry in std::mem::take(&mut self.pending_log) {
            let data = serde_json::to_value(&entry)
                .map_err(|e| ServiceError::Storage(format!("failed to encode log entry: {e}")))?;
            block_on(
                sqlx::query(
                    r#"
                    INSERT INTO inventory_log (user_id, component_id, action, created_at, data)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(entry.user_id.as_uuid())
                .bind(entry.component_id.as_uuid())
                .bind(entry.action.as_str())
                .bind(entry.created_at)
                .bind(data)
                .execute(&mut *self.tx),
            )?
            .map_err(|e| map_sqlx_error("insert_log", e))?;
        }

        block_on(self.tx.commit())?.map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    fn rollback(self) {
        match block_on(self.tx.rollback()) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "ledger rollback failed"),
            Err(err) => warn!(error = %err, "ledger rollback failed"),
        }
    }

    fn by_key(&mut self, key: &LedgerKey) -> ServiceResult<Option<InventoryEntry>> {
        let row = block_on(
            sqlx::query(
                r#"
                SELECT id, owner_id, component_id, location_id, quantity, updated_at
                FROM inventory_entries
                WHERE owner_id = $1 AND component_id = $2 AND location_id IS NOT DISTINCT FROM $3
                FOR UPDATE
                "#,
            )
            .bind(key.owner_id.as_uuid())
            .bind(key.component_id.as_uuid())
            .bind(location_uuid(key.location_id))
            .fetch_optional(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("select_entry", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    fn insert(&mut self, entry: &InventoryEntry) -> ServiceResult<()> {
        block_on(
            sqlx::query(
                r#"
                INSERT INTO inventory_entries (id, owner_id, component_id, location_id, quantity, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.owner_id.as_uuid())
            .bind(entry.component_id.as_uuid())
            .bind(location_uuid(entry.location_id))
            .bind(entry.quantity)
            .bind(entry.updated_at)
            .execute(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("insert_entry", e))?;
        Ok(())
    }

    fn update(&mut self, entry: &InventoryEntry) -> ServiceResult<()> {
        block_on(
            sqlx::query(
                r#"
                UPDATE inventory_entries
                SET location_id = $2, quantity = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(location_uuid(entry.location_id))
            .bind(entry.quantity)
            .bind(entry.updated_at)
            .execute(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("update_entry", e))?;
        Ok(())
    }

    fn delete(&mut self, id: EntryId) -> ServiceResult<()> {
        block_on(
            sqlx::query("DELETE FROM inventory_entries WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("delete_entry", e))?;
        Ok(())
    }
}

impl LedgerOps for PgLedgerTx {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn quantity(&mut self, key: &LedgerKey) -> ServiceResult<i64> {
        Ok(self.by_key(key)?.map(|e| e.quantity).unwrap_or(0))
    }

    fn total_for(&mut self, owner_id: UserId, component_id: ComponentId) -> ServiceResult<i64> {
        let rows = block_on(
            sqlx::query(
                r#"
                SELECT quantity
                FROM inventory_entries
                WHERE owner_id = $1 AND component_id = $2
                ORDER BY location_id ASC NULLS FIRST
                FOR UPDATE
                "#,
            )
            .bind(owner_id.as_uuid())
            .bind(component_id.as_uuid())
            .fetch_all(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("total_for", e))?;

        let quantities = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("quantity"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| decode_error("quantity", e))?;
        checked_sum(quantities)
    }

    fn entry(&mut self, id: EntryId) -> ServiceResult<Option<InventoryEntry>> {
        let row = block_on(
            sqlx::query(
                r#"
                SELECT id, owner_id, component_id, location_id, quantity, updated_at
                FROM inventory_entries
                WHERE id = $1
                FOR UPDATE
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("select_entry_by_id", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    fn entries_for_owner(&mut self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        let rows = block_on(
            sqlx::query(
                r#"
                SELECT id, owner_id, component_id, location_id, quantity, updated_at
                FROM inventory_entries
                WHERE owner_id = $1
                ORDER BY component_id ASC, location_id ASC NULLS FIRST
                FOR UPDATE
                "#,
            )
            .bind(owner_id.as_uuid())
            .fetch_all(&mut *self.tx),
        )?
        .map_err(|e| map_sqlx_error("entries_for_owner", e))?;

        entries_from_rows(&rows)
    }

    fn increment(&mut self, key: LedgerKey, delta: i64) -> ServiceResult<InventoryEntry> {
        ensure_positive(delta, "quantity")?;

        match self.by_key(&key)? {
            Some(mut existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(delta)
                    .ok_or_else(|| DomainError::validation("quantity overflow"))?;
                existing.updated_at = self.now;
                self.update(&existing)?;
                Ok(existing)
            }
            None => {
                let entry = InventoryEntry {
                    id: EntryId::new(),
                    owner_id: key.owner_id,
                    component_id: key.component_id,
                    location_id: key.location_id,
                    quantity: delta,
                    updated_at: self.now,
                };
                self.insert(&entry)?;
                Ok(entry)
            }
        }
    }

    fn decrement(&mut self, key: LedgerKey, delta: i64) -> ServiceResult<i64> {
        ensure_positive(delta, "quantity")?;

        let Some(mut existing) = self.by_key(&key)? else {
            return Err(DomainError::insufficient_stock(delta, 0).into());
        };
        if existing.quantity < delta {
            return Err(DomainError::insufficient_stock(delta, existing.quantity).into());
        }

        existing.quantity -= delta;
        if existing.quantity == 0 {
            self.delete(existing.id)?;
            return Ok(0);
        }
        existing.updated_at = self.now;
        self.update(&existing)?;
        Ok(existing.quantity)
    }

    fn move_within_owner(
        &mut self,
        key: LedgerKey,
        to: Option<LocationId>,
        quantity: i64,
    ) -> ServiceResult<InventoryEntry> {
        ensure_positive(quantity, "quantity")?;

        let Some(source) = self.by_key(&key)? else {
            return Err(DomainError::insufficient_stock(quantity, 0).into());
        };
        if source.quantity < quantity {
            return Err(DomainError::insufficient_stock(quantity, source.quantity).into());
        }
        if key.location_id == to {
            return Ok(source);
        }

        let destination = key.at(to);
        if source.quantity == quantity && self.by_key(&destination)?.is_none() {
            let moved = InventoryEntry {
                location_id: to,
                updated_at: self.now,
                ..source
            };
            self.update(&moved)?;
            return Ok(moved);
        }

        self.decrement(key, quantity)?;
        self.increment(destination, quantity)
    }

    fn record(&mut self, entry: InventoryLogEntry) {
        self.pending_log.push(entry);
    }
}

/// Postgres ledger store.
///
/// The store traits are synchronous; calls must come from a multi-threaded
/// tokio runtime (axum handlers qualify).
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LedgerStore for PostgresLedgerStore {
    fn transaction<T, F>(&self, work: F) -> ServiceResult<T>
    where
        F: FnOnce(&mut dyn LedgerOps) -> ServiceResult<T>,
    {
        let mut tx = PgLedgerTx::begin(&self.pool)?;
        match work(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback();
                Err(err)
            }
        }
    }

    fn entry(&self, id: EntryId) -> ServiceResult<Option<InventoryEntry>> {
        let row = block_on(
            sqlx::query(
                r#"
                SELECT id, owner_id, component_id, location_id, quantity, updated_at
                FROM inventory_entries
                WHERE id = $1
                "#,
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("entry", e))?;

        row.as_ref().map(entry_from_row).transpose()
    }

    fn entries_for_owner(&self, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        let rows = block_on(
            sqlx::query(
                r#"
                SELECT id, owner_id, component_id, location_id, quantity, updated_at
                FROM inventory_entries
                WHERE owner_id = $1
                ORDER BY component_id ASC, location_id ASC NULLS FIRST
                "#,
            )
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("entries_for_owner", e))?;

        entries_from_rows(&rows)
    }

    fn all_entries(&self) -> ServiceResult<Vec<InventoryEntry>> {
        let rows = block_on(
            sqlx::query(
                r#"
                SELECT id, owner_id, component_id, location_id, quantity, updated_at
                FROM inventory_entries
                ORDER BY owner_id ASC, component_id ASC, location_id ASC NULLS FIRST
                "#,
            )
            .fetch_all(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("all_entries", e))?;

        entries_from_rows(&rows)
    }

    fn history(&self, user_id: UserId) -> ServiceResult<Vec<InventoryLogEntry>> {
        let rows = block_on(
            sqlx::query("SELECT data FROM inventory_log WHERE user_id = $1 ORDER BY seq DESC")
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("history", e))?;

        rows.iter()
            .map(|row| {
                let data: serde_json::Value =
                    row.try_get("data").map_err(|e| decode_error("log row", e))?;
                serde_json::from_value(data).map_err(|e| decode_error("log entry", e))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartermaster_inventory::LogAction;

    /// Connects to `QM_TEST_DATABASE_URL`; these tests are skipped when it is unset.
    async fn test_store() -> Option<PostgresLedgerStore> {
        let url = std::env::var("QM_TEST_DATABASE_URL").ok()?;
        let pool = crate::pg::connect(&url).await.expect("test database");
        Some(PostgresLedgerStore::new(pool))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn increment_merges_and_decrement_to_zero_deletes() {
        let Some(store) = test_store().await else { return };
        let k = LedgerKey::new(UserId::new(), ComponentId::new(), None);

        let first = store.increment(k, 3).unwrap();
        let second = store.increment(k, 4).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.get(k).unwrap(), 7);

        assert_eq!(store.decrement(k, 7).unwrap(), 0);
        assert_eq!(store.entry(first.id).unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_transaction_discards_rows_and_log() {
        let Some(store) = test_store().await else { return };
        let owner = UserId::new();
        let component = ComponentId::new();
        let k = LedgerKey::new(owner, component, None);

        let err = store
            .transaction(|tx| {
                tx.increment(k, 5)?;
                let now = tx.now();
                tx.record(InventoryLogEntry::new(owner, component, LogAction::Add, 0, 5, now));
                tx.decrement(k.at(Some(LocationId::new())), 1)
            })
            .unwrap_err();

        assert!(matches!(err.as_domain(), Some(DomainError::InsufficientStock { .. })));
        assert_eq!(store.get(k).unwrap(), 0);
        assert!(store.history(owner).unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_move_keeps_the_row_and_commits_its_log() {
        let Some(store) = test_store().await else { return };
        let owner = UserId::new();
        let component = ComponentId::new();
        let k = LedgerKey::new(owner, component, None);
        let there = Some(LocationId::new());
        let original = store.increment(k, 2).unwrap();

        let moved = store
            .transaction(|tx| {
                let moved = tx.move_within_owner(k, there, 2)?;
                let now = tx.now();
                tx.record(InventoryLogEntry::new(owner, component, LogAction::Add, 0, 2, now));
                Ok(moved)
            })
            .unwrap();

        assert_eq!(moved.id, original.id);
        assert_eq!(moved.location_id, there);
        assert_eq!(store.entries_for_owner(owner).unwrap(), vec![moved]);
        assert_eq!(store.history(owner).unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn totals_that_overflow_are_rejected() {
        let Some(store) = test_store().await else { return };
        let owner = UserId::new();
        let component = ComponentId::new();
        store.increment(LedgerKey::new(owner, component, None), i64::MAX).unwrap();
        store
            .increment(LedgerKey::new(owner, component, Some(LocationId::new())), 1)
            .unwrap();

        let err = store.transaction(|tx| tx.total_for(owner, component)).unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }
}
