use std::sync::Arc;

use quartermaster_core::TransferRequestId;
use quartermaster_inventory::{RequestFilter, RequestStatus, TransferRequest};

use crate::error::ServiceResult;

pub trait TransferRequestStore: Send + Sync {
    /// Persist a newly created request. Order numbers are unique.
    fn insert(&self, request: TransferRequest) -> ServiceResult<()>;

    fn get(&self, id: TransferRequestId) -> ServiceResult<Option<TransferRequest>>;

    /// Requests matching `filter`, newest first.
    fn list(&self, filter: &RequestFilter) -> ServiceResult<Vec<TransferRequest>>;

    /// Requests whose order number contains `term` (case-insensitive), newest first.
    fn search_order_number(&self, term: &str) -> ServiceResult<Vec<TransferRequest>>;

    /// Apply `update` to the stored request only if its status is still `expected`.
    ///
    /// `update` runs while the row is held exclusively; if it fails, nothing
    /// is written. A status mismatch fails with `Conflict`.
    fn compare_and_swap<F>(
        &self,
        id: TransferRequestId,
        expected: RequestStatus,
        update: F,
    ) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>;

    /// Apply `update` regardless of status (comments).
    fn update<F>(&self, id: TransferRequestId, update: F) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>;
}

impl<S> TransferRequestStore for Arc<S>
where
    S: TransferRequestStore + ?Sized,
{
    fn insert(&self, request: TransferRequest) -> ServiceResult<()> {
        (**self).insert(request)
    }

    fn get(&self, id: TransferRequestId) -> ServiceResult<Option<TransferRequest>> {
        (**self).get(id)
    }

    fn list(&self, filter: &RequestFilter) -> ServiceResult<Vec<TransferRequest>> {
        (**self).list(filter)
    }

    fn search_order_number(&self, term: &str) -> ServiceResult<Vec<TransferRequest>> {
        (**self).search_order_number(term)
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
        (**self).compare_and_swap(id, expected, update)
    }

    fn update<F>(&self, id: TransferRequestId, update: F) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        (**self).update(id, update)
    }
}
