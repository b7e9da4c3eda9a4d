//! Shared Postgres plumbing for the persistent stores.
//!
//! The store traits are synchronous, so every backend call goes through
//! [`block_on`], which parks the calling worker with `block_in_place` and
//! drives the query on the ambient tokio runtime.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | ServiceError |
//! |------------|----------------------|--------------|
//! | Database (unique violation) | `23505` | `Domain(Conflict)` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Domain(Conflict)` |
//! | Database (check constraint violation) | `23514` | `Domain(Validation)` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / RowNotFound / other | N/A | `Storage` |

use std::future::Future;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::info;

use quartermaster_core::DomainError;

use crate::error::{ServiceError, ServiceResult};

/// Tables backing the ledger, the audit log, and transfer requests.
///
/// A missing location is stored as NULL; the unique index folds it to the nil
/// UUID so there is exactly one row per (owner, component, location).
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_entries (
    id           UUID PRIMARY KEY,
    owner_id     UUID NOT NULL,
    component_id UUID NOT NULL,
    location_id  UUID NULL,
    quantity     BIGINT NOT NULL CHECK (quantity > 0),
    updated_at   TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS inventory_entries_key
    ON inventory_entries (owner_id, component_id, COALESCE(location_id, '00000000-0000-0000-0000-000000000000'::uuid));

CREATE TABLE IF NOT EXISTS inventory_log (
    seq          BIGSERIAL PRIMARY KEY,
    user_id      UUID NOT NULL,
    component_id UUID NOT NULL,
    action       TEXT NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL,
    data         JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS inventory_log_user ON inventory_log (user_id, seq DESC);

CREATE TABLE IF NOT EXISTS transfer_requests (
    id           UUID PRIMARY KEY,
    order_number TEXT NOT NULL UNIQUE,
    status       TEXT NOT NULL,
    owner_id     UUID NOT NULL,
    requester_id UUID NOT NULL,
    component_id UUID NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL,
    data         JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS transfer_requests_owner ON transfer_requests (owner_id);
CREATE INDEX IF NOT EXISTS transfer_requests_requester ON transfer_requests (requester_id);

CREATE SEQUENCE IF NOT EXISTS transfer_request_order_seq;
"#;

/// Open a pool and make sure the schema exists.
pub async fn connect(database_url: &str) -> ServiceResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;
    migrate(&pool).await?;
    info!("postgres schema ready");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> ServiceResult<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

/// Run a query future to completion from synchronous store code.
///
/// Requires a multi-threaded tokio runtime: `block_in_place` is unavailable on
/// the current-thread flavor.
pub(crate) fn block_on<F: Future>(fut: F) -> ServiceResult<F::Output> {
    let handle = Handle::try_current().map_err(|_| {
        ServiceError::Storage("postgres stores must be used inside a tokio runtime".to_string())
    })?;
    if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
        return Err(ServiceError::Storage(
            "postgres stores need the multi-threaded tokio runtime".to_string(),
        ));
    }
    Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
}

/// Run blocking `work`, handing the worker's core back to the runtime first
/// when called from a multi-threaded tokio worker.
pub(crate) fn blocking<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            classify_sqlstate(db_err.code().as_deref(), msg)
        }
        sqlx::Error::PoolClosed => {
            ServiceError::Storage(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            ServiceError::Storage(format!("unexpected row not found in {operation}"))
        }
        _ => ServiceError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn classify_sqlstate(code: Option<&str>, msg: String) -> ServiceError {
    match code {
        Some("23505") | Some("40001") | Some("40P01") => DomainError::conflict(msg).into(),
        Some("23514") => DomainError::validation(msg).into(),
        _ => ServiceError::Storage(msg),
    }
}

pub(crate) fn decode_error(what: &str, err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Storage(format!("failed to decode {what}: {err}"))
}
