use std::collections::HashMap;
use std::sync::RwLock;

use quartermaster_core::{DomainError, TransferRequestId};
use quartermaster_inventory::{RequestFilter, RequestStatus, TransferRequest};

use super::r#trait::TransferRequestStore;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Default)]
struct RequestState {
    rows: HashMap<TransferRequestId, TransferRequest>,
    order_numbers: HashMap<String, TransferRequestId>,
}

impl RequestState {
    fn newest_first<'a>(rows: impl Iterator<Item = &'a TransferRequest>) -> Vec<TransferRequest> {
        let mut out: Vec<TransferRequest> = rows.cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    fn modify<F>(
        &mut self,
        id: TransferRequestId,
        expected: Option<RequestStatus>,
        update: F,
    ) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        let row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found(format!("transfer request {id}")))?;

        if let Some(expected) = expected {
            if row.status != expected {
                return Err(DomainError::conflict(format!(
                    "request {} is {}, expected {}",
                    row.order_number, row.status, expected
                ))
                .into());
            }
        }

        let mut next = row.clone();
        update(&mut next)?;
        if next.order_number != row.order_number {
            return Err(DomainError::conflict("order numbers are immutable").into());
        }

        *row = next;
        Ok(row.clone())
    }
}

/// In-memory request store.
///
/// The write lock is held for the whole of a compare-and-swap, including the
/// caller's update closure.
#[derive(Debug, Default)]
pub struct InMemoryTransferRequestStore {
    state: RwLock<RequestState>,
}

impl InMemoryTransferRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransferRequestStore for InMemoryTransferRequestStore {
    fn insert(&self, request: TransferRequest) -> ServiceResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ServiceError::poisoned("request store"))?;

        if state.rows.contains_key(&request.id) {
            return Err(DomainError::conflict(format!("transfer request {} already exists", request.id)).into());
        }
        if state.order_numbers.contains_key(&request.order_number) {
            return Err(DomainError::conflict(format!(
                "order number {} is already taken",
                request.order_number
            ))
            .into());
        }

        state.order_numbers.insert(request.order_number.clone(), request.id);
        state.rows.insert(request.id, request);
        Ok(())
    }

    fn get(&self, id: TransferRequestId) -> ServiceResult<Option<TransferRequest>> {
        let state = self
            .state
            .read()
            .map_err(|_| ServiceError::poisoned("request store"))?;
        Ok(state.rows.get(&id).cloned())
    }

    fn list(&self, filter: &RequestFilter) -> ServiceResult<Vec<TransferRequest>> {
        let state = self
            .state
            .read()
            .map_err(|_| ServiceError::poisoned("request store"))?;
        Ok(RequestState::newest_first(
            state.rows.values().filter(|r| filter.matches(r)),
        ))
    }

    fn search_order_number(&self, term: &str) -> ServiceResult<Vec<TransferRequest>> {
        let state = self
            .state
            .read()
            .map_err(|_| ServiceError::poisoned("request store"))?;
        Ok(RequestState::newest_first(
            state.rows.values().filter(|r| r.matches_order_number(term)),
        ))
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
        let mut state = self
            .state
            .write()
            .map_err(|_| ServiceError::poisoned("request store"))?;
        state.modify(id, Some(expected), update)
    }

    fn update<F>(&self, id: TransferRequestId, update: F) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&mut TransferRequest) -> ServiceResult<()>,
    {
        let mut state = self
            .state
            .write()
            .map_err(|_| ServiceError::poisoned("request store"))?;
        state.modify(id, None, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quartermaster_core::{Aggregate, ComponentId, UserId};
    use quartermaster_inventory::{ActOnRequest, CreateRequest, TransferRequestCommand};

    fn test_request(order_number: &str) -> TransferRequest {
        let id = TransferRequestId::new();
        let mut request = TransferRequest::empty(id);
        let command = TransferRequestCommand::Create(CreateRequest {
            request_id: id,
            order_number: order_number.to_string(),
            requester_id: UserId::new(),
            owner_id: UserId::new(),
            component_id: ComponentId::new(),
            from_location_id: None,
            to_location_id: None,
            quantity: 2,
            notes: None,
            occurred_at: Utc::now(),
        });
        for event in request.handle(&command).unwrap() {
            request.apply(&event);
        }
        request
    }

    fn approve(request: &mut TransferRequest) -> ServiceResult<()> {
        let command = TransferRequestCommand::Approve(ActOnRequest {
            request_id: request.id,
            actor_id: request.owner_id,
            occurred_at: Utc::now(),
        });
        for event in request.handle(&command)? {
            request.apply(&event);
        }
        Ok(())
    }

    #[test]
    fn duplicate_order_numbers_conflict() {
        let store = InMemoryTransferRequestStore::new();
        store.insert(test_request("TR-000001")).unwrap();

        let err = store.insert(test_request("TR-000001")).unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn compare_and_swap_requires_expected_status() {
        let store = InMemoryTransferRequestStore::new();
        let request = test_request("TR-000002");
        let id = request.id;
        store.insert(request).unwrap();

        let approved = store
            .compare_and_swap(id, RequestStatus::Pending, approve)
            .unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);

        let err = store
            .compare_and_swap(id, RequestStatus::Pending, approve)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn failing_update_leaves_row_untouched() {
        let store = InMemoryTransferRequestStore::new();
        let request = test_request("TR-000003");
        let id = request.id;
        store.insert(request.clone()).unwrap();

        let err = store
            .compare_and_swap(id, RequestStatus::Pending, |row| {
                approve(row)?;
                Err(DomainError::insufficient_stock(2, 0).into())
            })
            .unwrap_err();

        assert_eq!(err, ServiceError::Domain(DomainError::insufficient_stock(2, 0)));
        assert_eq!(store.get(id).unwrap(), Some(request));
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let store = InMemoryTransferRequestStore::new();
        store.insert(test_request("TR-000010")).unwrap();
        store.insert(test_request("TR-000011")).unwrap();
        store.insert(test_request("XX-000099")).unwrap();

        assert_eq!(store.search_order_number("tr-00001").unwrap().len(), 2);
        assert_eq!(store.search_order_number("  xx ").unwrap().len(), 1);
    }

    #[test]
    fn unknown_request_is_not_found() {
        let store = InMemoryTransferRequestStore::new();
        let err = store
            .update(TransferRequestId::new(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }
}
