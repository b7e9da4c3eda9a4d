//! Transfer-request persistence.
//!
//! Status changes go through [`TransferRequestStore::compare_and_swap`]: the
//! update only lands if the stored status still equals the status the caller
//! validated against.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryTransferRequestStore;
pub use postgres::PostgresTransferRequestStore;
pub use r#trait::TransferRequestStore;

use quartermaster_core::TransferRequestId;
use quartermaster_inventory::{RequestFilter, RequestStatus, TransferRequest};

use crate::error::ServiceResult;

/// Request store backend chosen at startup.
#[derive(Debug)]
pub enum RequestBackend {
    InMemory(InMemoryTransferRequestStore),
    Postgres(PostgresTransferRequestStore),
}

impl TransferRequestStore for RequestBackend {
    fn insert(&self, request: TransferRequest) -> ServiceResult<()> {
        match self {
            RequestBackend::InMemory(store) => store.insert(request),
            RequestBackend::Postgres(store) => store.insert(request),
        }
    }

    fn get(&self, id: TransferRequestId) -> ServiceResult<Option<TransferRequest>> {
        match self {
            RequestBackend::InMemory(store) => store.get(id),
            RequestBackend::Postgres(store) => store.get(id),
        }
    }

    fn list(&self, filter: &RequestFilter) -> ServiceResult<Vec<TransferRequest>> {
        match self {
            RequestBackend::InMemory(store) => store.list(filter),
            RequestBackend::Postgres(store) => store.list(filter),
        }
    }

    fn search_order_number(&self, term: &str) -> ServiceResult<Vec<TransferRequest>> {
        match self {
            RequestBackend::InMemory(store) => store.search_order_number(term),
            RequestBackend::Postgres(store) => store.search_order_number(term),
        }
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
        match self {
            RequestBackend::InMemory(store) => store.compare_and_swap(id, expected, update),
            RequestBackend::Postgres(store) => store.compare_and_swap(id, expected, update),
        }
    }

    fn update<F>(&self, id: TransferRequestId, update: F) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        match self {
            RequestBackend::InMemory(store) => store.update(id, update),
            RequestBackend::Postgres(store) => store.update(id, update),
        }
    }
}
