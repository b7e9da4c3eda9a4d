//! Postgres-backed transfer request store.
//!
//! The full request is kept as JSONB next to the columns that queries filter
//! on. A compare-and-swap locks the row with `SELECT … FOR UPDATE`, runs the
//! caller's update, and writes back with `UPDATE … WHERE id = $1 AND status = $2`,
//! so a status change only lands from the status the caller validated.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::warn;

use quartermaster_core::{DomainError, TransferRequestId};
use quartermaster_inventory::{RequestFilter, RequestStatus, TransferRequest};

use super::r#trait::TransferRequestStore;
use crate::error::{ServiceError, ServiceResult};
use crate::pg::{block_on, decode_error, map_sqlx_error};

fn request_from_row(row: &PgRow) -> ServiceResult<TransferRequest> {
    let data: serde_json::Value = row
        .try_get("data")
        .map_err(|e| decode_error("transfer request row", e))?;
    serde_json::from_value(data).map_err(|e| decode_error("transfer request", e))
}

fn requests_from_rows(rows: &[PgRow]) -> ServiceResult<Vec<TransferRequest>> {
    rows.iter().map(request_from_row).collect()
}

fn encode(request: &TransferRequest) -> ServiceResult<serde_json::Value> {
    serde_json::to_value(request)
        .map_err(|e| ServiceError::Storage(format!("failed to encode transfer request: {e}")))
}

fn rollback(tx: Transaction<'static, Postgres>) {
    match block_on(tx.rollback()) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "request rollback failed"),
        Err(err) => warn!(error = %err, "request rollback failed"),
    }
}

/// Postgres request store. Calls must come from a multi-threaded tokio runtime.
#[derive(Debug, Clone)]
pub struct PostgresTransferRequestStore {
    pool: PgPool,
}

impl PostgresTransferRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn modify<F>(
        &self,
        id: TransferRequestId,
        expected: Option<RequestStatus>,
        update: F,
    ) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        let (mut tx, row) = block_on(async {
            let mut tx = self.pool.begin().await?;
            let row = sqlx::query("SELECT data FROM transfer_requests WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
            Ok::<_, sqlx::Error>((tx, row))
        })?
        .map_err(|e| map_sqlx_error("lock_request", e))?;

        let Some(row) = row else {
            rollback(tx);
            return Err(DomainError::not_found(format!("transfer request {id}")).into());
        };

        let (current_status, next, data) = match Self::apply_update(&row, expected, update) {
            Ok(updated) => updated,
            Err(err) => {
                rollback(tx);
                return Err(err);
            }
        };

        let result = block_on(async {
            let written = sqlx::query(
                r#"
                UPDATE transfer_requests
                SET status = $3, data = $4
                WHERE id = $1 AND status = $2
                "#,
            )
            .bind(id.as_uuid())
            .bind(current_status.as_str())
            .bind(next.status.as_str())
            .bind(data)
            .execute(&mut *tx)
            .await?;
            if written.rows_affected() != 1 {
                return Ok(false);
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(true)
        })?
        .map_err(|e| map_sqlx_error("update_request", e))?;

        if !result {
            return Err(DomainError::conflict(format!(
                "request {} changed status concurrently",
                next.order_number
            ))
            .into());
        }
        Ok(next)
    }

    fn apply_update<F>(
        row: &PgRow,
        expected: Option<RequestStatus>,
        update: F,
    ) -> ServiceResult<(RequestStatus, TransferRequest, serde_json::Value)>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        let current = request_from_row(row)?;
        if let Some(expected) = expected {
            if current.status != expected {
                return Err(DomainError::conflict(format!(
                    "request {} is {}, expected {}",
                    current.order_number, current.status, expected
                ))
                .into());
            }
        }

        let mut next = current.clone();
        update(&mut next)?;
        if next.order_number != current.order_number {
            return Err(DomainError::conflict("order numbers are immutable").into());
        }
        let data = encode(&next)?;
        Ok((current.status, next, data))
    }
}

impl TransferRequestStore for PostgresTransferRequestStore {
    fn insert(&self, request: TransferRequest) -> ServiceResult<()> {
        let data = encode(&request)?;
        block_on(
            sqlx::query(
                r#"
                INSERT INTO transfer_requests
                    (id, order_number, status, owner_id, requester_id, component_id, created_at, data)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(request.id.as_uuid())
            .bind(&request.order_number)
            .bind(request.status.as_str())
            .bind(request.owner_id.as_uuid())
            .bind(request.requester_id.as_uuid())
            .bind(request.component_id.as_uuid())
            .bind(request.created_at)
            .bind(data)
            .execute(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("insert_request", e))?;
        Ok(())
    }

    fn get(&self, id: TransferRequestId) -> ServiceResult<Option<TransferRequest>> {
        let row = block_on(
            sqlx::query("SELECT data FROM transfer_requests WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("get_request", e))?;

        row.as_ref().map(request_from_row).transpose()
    }

    fn list(&self, filter: &RequestFilter) -> ServiceResult<Vec<TransferRequest>> {
        let rows = block_on(
            sqlx::query(
                r#"
                SELECT data
                FROM transfer_requests
                WHERE ($1::text IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR owner_id = $2)
                  AND ($3::uuid IS NULL OR requester_id = $3)
                  AND ($4::uuid IS NULL OR component_id = $4)
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.owner_id.map(uuid::Uuid::from))
            .bind(filter.requester_id.map(uuid::Uuid::from))
            .bind(filter.component_id.map(uuid::Uuid::from))
            .fetch_all(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("list_requests", e))?;

        requests_from_rows(&rows)
    }

    fn search_order_number(&self, term: &str) -> ServiceResult<Vec<TransferRequest>> {
        let rows = block_on(
            sqlx::query(
                r#"
                SELECT data
                FROM transfer_requests
                WHERE strpos(lower(order_number), $1) > 0
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(term.trim().to_ascii_lowercase())
            .fetch_all(&self.pool),
        )?
        .map_err(|e| map_sqlx_error("search_requests", e))?;

        requests_from_rows(&rows)
    }

    fn compare_and_swap<F>(
        &self,
        id: TransferRequestId,
        expected: RequestStatus,
        update: F,
    ) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        self.modify(id, Some(expected), update)
    }

    fn update<F>(&self, id: TransferRequestId, update: F) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        self.modify(id, None, update)
    }
}
