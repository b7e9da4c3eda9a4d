//! Transfer Request Engine.
//!
//! Drives the request workflow: loads the row, authorizes the actor, lets the
//! aggregate decide the transition, then commits it through the store's
//! status compare-and-swap. Completion moves stock through the Direct
//! Movement Service inside that same compare-and-swap, so it fires at most
//! once. Committed events are published before the request's publish lock
//! is released, so each request's events reach the bus in sequence order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quartermaster_auth::{
    Actor, Capability, IdentityDirectory, ResourceContext, can_view_request, is_owner_side,
};
use quartermaster_core::{
    Aggregate, AggregateRoot, ComponentId, DomainError, LocationId, TransferRequestId, UserId,
};
use quartermaster_events::{EventBus, EventEnvelope};
use quartermaster_inventory::{
    ActOnRequest, CommentOnRequest, CreateRequest, RejectRequest, RequestFilter, RequestStatus,
    TransferRequest, TransferRequestCommand, TransferRequestEvent,
};

use crate::catalog::Catalog;
use crate::error::{ServiceError, ServiceResult};
use crate::guard::{known_component, known_location, known_user, permit};
use crate::ledger_store::LedgerStore;
use crate::movement::{DirectMovementService, TransferStock};
use crate::order_numbers::OrderNumberGenerator;
use crate::pg::blocking;
use crate::request_store::TransferRequestStore;

/// Stream type stamped on published request envelopes.
pub const REQUEST_STREAM_TYPE: &str = "inventory.transfer_request";

const PUBLISH_STRIPES: usize = 32;

/// Requester input for a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransferRequest {
    pub owner_id: UserId,
    pub component_id: ComponentId,
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct TransferRequestEngine<L, R, B> {
    movement: Arc<DirectMovementService<L>>,
    requests: R,
    orders: Arc<dyn OrderNumberGenerator>,
    bus: B,
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn IdentityDirectory>,
    /// Striped by request id; held from the store write through publishing.
    publish_order: Vec<Mutex<()>>,
}

impl<L, R, B> TransferRequestEngine<L, R, B>
where
    L: LedgerStore,
    R: TransferRequestStore,
    B: EventBus<EventEnvelope<TransferRequestEvent>>,
{
    pub fn new(
        movement: Arc<DirectMovementService<L>>,
        requests: R,
        orders: Arc<dyn OrderNumberGenerator>,
        bus: B,
        catalog: Arc<dyn Catalog>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        Self {
            movement,
            requests,
            orders,
            bus,
            catalog,
            directory,
            publish_order: (0..PUBLISH_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn requests(&self) -> &R {
        &self.requests
    }

    /// Open a request for stock held by `new.owner_id`. No stock check happens here.
    #[tracing::instrument(skip_all, fields(actor = %actor.user_id, owner = %new.owner_id), err)]
    pub fn create_request(
        &self,
        actor: &Actor,
        new: NewTransferRequest,
    ) -> ServiceResult<TransferRequest> {
        permit(actor, ResourceContext::RequestCreate { owner: new.owner_id })?;
        known_user(self.directory.as_ref(), new.owner_id)?;
        known_component(self.catalog.as_ref(), new.component_id)?;
        known_location(self.catalog.as_ref(), new.from_location_id)?;
        known_location(self.catalog.as_ref(), new.to_location_id)?;

        let id = TransferRequestId::new();
        let command = TransferRequestCommand::Create(CreateRequest {
            request_id: id,
            order_number: self.orders.next_order_number()?,
            requester_id: actor.user_id,
            owner_id: new.owner_id,
            component_id: new.component_id,
            from_location_id: new.from_location_id,
            to_location_id: new.to_location_id,
            quantity: new.quantity,
            notes: new.notes,
            occurred_at: Utc::now(),
        });

        let mut request = TransferRequest::empty(id);
        let events = request.handle(&command)?;
        for event in &events {
            request.apply(event);
        }
        let ordered = self.publish_lock(id)?;
        self.requests.insert(request.clone())?;
        self.publish(&request, events);
        drop(ordered);

        tracing::info!(request = %request.id, order_number = %request.order_number, "request created");
        Ok(request)
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn approve_request(
        &self,
        actor: &Actor,
        id: TransferRequestId,
    ) -> ServiceResult<TransferRequest> {
        self.review(actor, id, |request| {
            TransferRequestCommand::Approve(act(request, actor))
        })
    }

    #[tracing::instrument(skip(self, actor, reason), fields(actor = %actor.user_id), err)]
    pub fn reject_request(
        &self,
        actor: &Actor,
        id: TransferRequestId,
        reason: String,
    ) -> ServiceResult<TransferRequest> {
        self.review(actor, id, |request| {
            TransferRequestCommand::Reject(RejectRequest {
                request_id: request.id,
                actor_id: actor.user_id,
                reason,
                occurred_at: Utc::now(),
            })
        })
    }

    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn deliver_request(
        &self,
        actor: &Actor,
        id: TransferRequestId,
    ) -> ServiceResult<TransferRequest> {
        self.review(actor, id, |request| {
            TransferRequestCommand::Deliver(act(request, actor))
        })
    }

    /// Owner-side comment. `Some("")` clears a field, `None` leaves it alone.
    #[tracing::instrument(skip(self, actor, pioneer_comment, public_comment), fields(actor = %actor.user_id), err)]
    pub fn comment_request(
        &self,
        actor: &Actor,
        id: TransferRequestId,
        pioneer_comment: Option<String>,
        public_comment: Option<String>,
    ) -> ServiceResult<TransferRequest> {
        self.review(actor, id, |request| {
            TransferRequestCommand::Comment(CommentOnRequest {
                request_id: request.id,
                actor_id: actor.user_id,
                pioneer_comment,
                public_comment,
                occurred_at: Utc::now(),
            })
        })
    }

    /// Complete a delivered request, moving the stock owner → requester.
    ///
    /// Stock is re-validated at this point. On `InsufficientStock` the request
    /// stays `AWAITING_RECEIPT` and nothing moves.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn confirm_receipt(
        &self,
        actor: &Actor,
        id: TransferRequestId,
    ) -> ServiceResult<TransferRequest> {
        let current = self.load(id)?;
        let requester_active = self.is_active(current.requester_id);
        permit(
            actor,
            ResourceContext::RequestReceipt {
                requester: current.requester_id,
                requester_active,
            },
        )?;

        let command = TransferRequestCommand::ConfirmReceipt(act(&current, actor));
        self.commit(&current, command, |row| {
            self.movement
                .settle_transfer(TransferStock {
                    from_owner_id: row.owner_id,
                    to_owner_id: row.requester_id,
                    component_id: row.component_id,
                    quantity: row.quantity,
                    from_location_id: row.from_location_id,
                    to_location_id: row.to_location_id,
                    notes: Some(format!("transfer request {}", row.order_number)),
                })
                .map(|_| ())
        })
    }

    /// A single request, redacted unless the viewer is owner-side.
    pub fn get_request(&self, actor: &Actor, id: TransferRequestId) -> ServiceResult<TransferRequest> {
        let request = self.load(id)?;
        let owner_is_pioneer = self.is_pioneer(request.owner_id);
        permit(
            actor,
            ResourceContext::RequestView {
                owner: request.owner_id,
                owner_is_pioneer,
                requester: request.requester_id,
            },
        )?;

        if is_owner_side(actor, request.owner_id, owner_is_pioneer) {
            Ok(request)
        } else {
            Ok(request.redacted_for_requester())
        }
    }

    /// Whether `actor` may see request `id`. Refusals are not logged, which
    /// suits per-event filtering of realtime feeds.
    pub fn is_visible_to(&self, actor: &Actor, id: TransferRequestId) -> bool {
        match self.requests.get(id) {
            Ok(Some(request)) => can_view_request(
                actor,
                request.owner_id,
                self.is_pioneer(request.owner_id),
                request.requester_id,
            ),
            Ok(None) => false,
            Err(err) => {
                tracing::debug!(request = %id, %err, "visibility lookup failed");
                false
            }
        }
    }

    /// Requests matching `filter` that the viewer takes part in, newest first.
    pub fn list_requests(
        &self,
        actor: &Actor,
        filter: &RequestFilter,
    ) -> ServiceResult<Vec<TransferRequest>> {
        permit(actor, ResourceContext::InventoryRead)?;
        let rows = self.requests.list(filter)?;
        Ok(self.visible_to(actor, rows))
    }

    /// Case-insensitive substring search over order numbers.
    pub fn search_by_order_number(
        &self,
        actor: &Actor,
        term: &str,
    ) -> ServiceResult<Vec<TransferRequest>> {
        permit(actor, ResourceContext::InventoryRead)?;
        let term = term.trim();
        if term.is_empty() {
            return Err(DomainError::validation("search term cannot be empty").into());
        }
        let rows = self.requests.search_order_number(term)?;
        Ok(self.visible_to(actor, rows))
    }

    fn review<F>(&self, actor: &Actor, id: TransferRequestId, command: F) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&TransferRequest) -> TransferRequestCommand,
    {
        let current = self.load(id)?;
        permit(
            actor,
            ResourceContext::RequestReview {
                owner: current.owner_id,
                owner_is_pioneer: self.is_pioneer(current.owner_id),
            },
        )?;
        let command = command(&current);
        self.commit(&current, command, |_| Ok(()))
    }

    /// Validate `command` against `current`, then persist it.
    ///
    /// Status transitions are conditional on the status `current` was read
    /// with; `settle` runs under that condition before the row is written.
    /// The request's publish lock is held until its events are on the bus.
    fn commit<F>(
        &self,
        current: &TransferRequest,
        command: TransferRequestCommand,
        settle: F,
    ) -> ServiceResult<TransferRequest>
    where
        F: FnOnce(&TransferRequest) -> ServiceResult<()>,
    {
        let events = current.handle(&command)?;
        let _ordered = self.publish_lock(current.id)?;
        let apply = |row: &mut TransferRequest| {
            for event in &events {
                row.apply(event);
            }
        };

        let updated = match command {
            TransferRequestCommand::Comment(_) => self.requests.update(current.id, |row| {
                apply(row);
                Ok(())
            })?,
            _ => self
                .requests
                .compare_and_swap(current.id, current.status, |row| {
                    settle(row)?;
                    apply(row);
                    Ok(())
                })?,
        };

        tracing::info!(
            request = %updated.id,
            action = command.name(),
            status = %updated.status,
            "request updated"
        );
        self.publish(&updated, events);
        Ok(updated)
    }

    fn publish_lock(&self, id: TransferRequestId) -> ServiceResult<MutexGuard<'_, ()>> {
        let stripe = &self.publish_order[(id.as_uuid().as_u128() % PUBLISH_STRIPES as u128) as usize];
        blocking(|| stripe.lock()).map_err(|_| ServiceError::poisoned("request publish"))
    }

    fn load(&self, id: TransferRequestId) -> ServiceResult<TransferRequest> {
        self.requests
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("transfer request {id}")).into())
    }

    fn is_pioneer(&self, user_id: UserId) -> bool {
        self.directory
            .profile(user_id)
            .is_some_and(|p| p.is_pioneer())
    }

    /// Users missing from the directory count as inactive.
    fn is_active(&self, user_id: UserId) -> bool {
        self.directory
            .profile(user_id)
            .is_some_and(|p| p.is_active())
    }

    fn visible_to(&self, actor: &Actor, rows: Vec<TransferRequest>) -> Vec<TransferRequest> {
        if actor.has(Capability::Admin) {
            return rows;
        }

        let mut pool_owners: HashMap<UserId, bool> = HashMap::new();
        rows.into_iter()
            .filter_map(|request| {
                let owner_is_pioneer = *pool_owners
                    .entry(request.owner_id)
                    .or_insert_with(|| self.is_pioneer(request.owner_id));
                if is_owner_side(actor, request.owner_id, owner_is_pioneer) {
                    Some(request)
                } else if request.requester_id == actor.user_id {
                    Some(request.redacted_for_requester())
                } else {
                    None
                }
            })
            .collect()
    }

    fn publish(&self, request: &TransferRequest, events: Vec<TransferRequestEvent>) {
        let first = request.version() + 1 - events.len() as u64;
        for (offset, event) in events.into_iter().enumerate() {
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                *request.id.as_uuid(),
                REQUEST_STREAM_TYPE,
                first + offset as u64,
                event,
            );
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(request = %request.id, ?err, "failed to publish request event");
            }
        }
    }
}

fn act(request: &TransferRequest, actor: &Actor) -> ActOnRequest {
    ActOnRequest {
        request_id: request.id,
        actor_id: actor.user_id,
        occurred_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use quartermaster_auth::{Role, UserProfile};
    use quartermaster_events::InMemoryEventBus;
    use quartermaster_inventory::LedgerKey;

    use crate::catalog::InMemoryCatalog;
    use crate::error::ServiceError;
    use crate::identity::InMemoryIdentityDirectory;
    use crate::ledger_store::InMemoryLedgerStore;
    use crate::movement::{AddStock, StockSource};
    use crate::order_numbers::SequentialOrderNumbers;
    use crate::request_store::InMemoryTransferRequestStore;

    type Engine = TransferRequestEngine<
        Arc<InMemoryLedgerStore>,
        Arc<InMemoryTransferRequestStore>,
        Arc<InMemoryEventBus<EventEnvelope<TransferRequestEvent>>>,
    >;

    struct Fixture {
        engine: Engine,
        movement: Arc<DirectMovementService<Arc<InMemoryLedgerStore>>>,
        directory: Arc<InMemoryIdentityDirectory>,
        bus: Arc<InMemoryEventBus<EventEnvelope<TransferRequestEvent>>>,
        component: ComponentId,
    }

    impl Fixture {
        fn new() -> Self {
            let directory = Arc::new(InMemoryIdentityDirectory::new());
            let catalog = Arc::new(InMemoryCatalog::new());
            let component = ComponentId::new();
            catalog.add_component(component, "Shield generator").unwrap();

            let movement = Arc::new(DirectMovementService::new(
                Arc::new(InMemoryLedgerStore::new()),
                catalog.clone(),
                directory.clone(),
            ));
            let bus = Arc::new(InMemoryEventBus::new());
            let engine = TransferRequestEngine::new(
                movement.clone(),
                Arc::new(InMemoryTransferRequestStore::new()),
                Arc::new(SequentialOrderNumbers::new("TR")),
                bus.clone(),
                catalog,
                directory.clone(),
            );
            Self {
                engine,
                movement,
                directory,
                bus,
                component,
            }
        }

        fn user(&self, role: Role) -> Actor {
            let profile = UserProfile::new(UserId::new(), "test user", vec![role]);
            self.directory.upsert(profile.clone()).unwrap();
            Actor::from(&profile)
        }

        fn stock(&self, owner: &Actor, quantity: i64) {
            self.movement
                .add(
                    owner,
                    AddStock {
                        owner_id: owner.user_id,
                        component_id: self.component,
                        location_id: None,
                        quantity,
                        source: StockSource::Manual,
                        notes: None,
                    },
                )
                .unwrap();
        }

        fn request(&self, requester: &Actor, owner: &Actor, quantity: i64) -> TransferRequest {
            self.engine
                .create_request(
                    requester,
                    NewTransferRequest {
                        owner_id: owner.user_id,
                        component_id: self.component,
                        from_location_id: None,
                        to_location_id: None,
                        quantity,
                        notes: None,
                    },
                )
                .unwrap()
        }

        fn held(&self, owner: &Actor) -> i64 {
            self.movement
                .ledger()
                .get(LedgerKey::new(owner.user_id, self.component, None))
                .unwrap()
        }
    }

    fn is_unauthorized(result: ServiceResult<TransferRequest>) -> bool {
        matches!(result, Err(ServiceError::Domain(DomainError::Unauthorized(_))))
    }

    #[test]
    fn full_workflow_moves_stock_once() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        fx.stock(&owner, 10);

        let request = fx.request(&requester, &owner, 4);
        assert_eq!(request.order_number, "TR-000001");
        assert_eq!(request.status, RequestStatus::Pending);

        fx.engine.approve_request(&owner, request.id).unwrap();
        fx.engine.deliver_request(&owner, request.id).unwrap();
        let done = fx.engine.confirm_receipt(&requester, request.id).unwrap();

        assert_eq!(done.status, RequestStatus::Completed);
        assert_eq!(done.confirmed_by, Some(requester.user_id));
        assert_eq!(fx.held(&owner), 6);
        assert_eq!(fx.held(&requester), 4);

        let again = fx.engine.confirm_receipt(&requester, request.id).unwrap_err();
        assert!(matches!(
            again,
            ServiceError::Domain(DomainError::InvalidStateTransition { .. })
        ));
        assert_eq!(fx.held(&requester), 4);
    }

    #[test]
    fn only_owner_side_may_review() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let stranger = fx.user(Role::PIONEER);
        let request = fx.request(&requester, &owner, 1);

        assert!(is_unauthorized(fx.engine.approve_request(&requester, request.id)));
        assert!(is_unauthorized(fx.engine.approve_request(&stranger, request.id)));
        assert!(fx.engine.approve_request(&owner, request.id).is_ok());
    }

    #[test]
    fn pool_requests_are_co_managed_by_pioneers() {
        let fx = Fixture::new();
        let pool = fx.user(Role::PIONEER);
        let other_pioneer = fx.user(Role::PIONEER);
        let requester = fx.user(Role::MEMBER);
        let request = fx.request(&requester, &pool, 1);

        let approved = fx.engine.approve_request(&other_pioneer, request.id).unwrap();
        assert_eq!(approved.approved_by, Some(other_pioneer.user_id));
    }

    #[test]
    fn requester_cannot_confirm_before_delivery() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        fx.stock(&owner, 5);
        let request = fx.request(&requester, &owner, 1);
        fx.engine.approve_request(&owner, request.id).unwrap();

        let err = fx.engine.confirm_receipt(&requester, request.id).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::InvalidStateTransition { .. })
        ));
        assert_eq!(fx.held(&owner), 5);
    }

    #[test]
    fn admin_confirms_for_inactive_requester_only() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let admin = fx.user(Role::ADMIN);
        fx.stock(&owner, 3);
        let request = fx.request(&requester, &owner, 2);
        fx.engine.approve_request(&owner, request.id).unwrap();
        fx.engine.deliver_request(&owner, request.id).unwrap();

        assert!(is_unauthorized(fx.engine.confirm_receipt(&admin, request.id)));

        fx.directory.deactivate(requester.user_id).unwrap();
        let done = fx.engine.confirm_receipt(&admin, request.id).unwrap();
        assert_eq!(done.confirmed_by, Some(admin.user_id));
        assert_eq!(fx.held(&requester), 2);
    }

    #[test]
    fn rejection_needs_a_reason_and_is_terminal() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let request = fx.request(&requester, &owner, 1);

        assert!(matches!(
            fx.engine.reject_request(&owner, request.id, "   ".to_string()),
            Err(ServiceError::Domain(DomainError::Validation(_)))
        ));
        let rejected = fx
            .engine
            .reject_request(&owner, request.id, " out of stock ".to_string())
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("out of stock"));
        assert!(fx.engine.approve_request(&owner, request.id).is_err());
    }

    #[test]
    fn pioneer_comment_is_hidden_from_requester() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let request = fx.request(&requester, &owner, 1);

        fx.engine
            .comment_request(
                &owner,
                request.id,
                Some("hold until the op".to_string()),
                Some("coming soon".to_string()),
            )
            .unwrap();

        let seen_by_owner = fx.engine.get_request(&owner, request.id).unwrap();
        assert_eq!(seen_by_owner.pioneer_comment.as_deref(), Some("hold until the op"));

        let seen_by_requester = fx.engine.get_request(&requester, request.id).unwrap();
        assert_eq!(seen_by_requester.pioneer_comment, None);
        assert_eq!(seen_by_requester.public_comment.as_deref(), Some("coming soon"));

        let listed = fx
            .engine
            .list_requests(&requester, &RequestFilter::default())
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pioneer_comment, None);
    }

    #[test]
    fn listings_hide_other_peoples_requests() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let bystander = fx.user(Role::MEMBER);
        let admin = fx.user(Role::ADMIN);
        fx.request(&requester, &owner, 1);

        let all = RequestFilter::default();
        assert!(fx.engine.list_requests(&bystander, &all).unwrap().is_empty());
        assert_eq!(fx.engine.list_requests(&owner, &all).unwrap().len(), 1);
        assert_eq!(fx.engine.list_requests(&admin, &all).unwrap().len(), 1);
    }

    #[test]
    fn search_needs_a_term_and_ignores_case() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        fx.request(&requester, &owner, 1);

        assert!(matches!(
            fx.engine.search_by_order_number(&requester, "  "),
            Err(ServiceError::Domain(DomainError::Validation(_)))
        ));
        assert_eq!(
            fx.engine
                .search_by_order_number(&requester, "tr-0000")
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn committed_transitions_are_published_in_order() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let subscription = fx.bus.subscribe();

        let request = fx.request(&requester, &owner, 1);
        fx.engine.approve_request(&owner, request.id).unwrap();
        let _ = fx.engine.approve_request(&owner, request.id);

        let created = subscription.recv_timeout(Duration::from_secs(1)).unwrap();
        let approved = subscription.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(created.sequence_number(), 1);
        assert_eq!(approved.sequence_number(), 2);
        assert!(matches!(approved.payload(), TransferRequestEvent::Approved(_)));
        assert!(subscription.try_recv().is_err());
    }

    #[test]
    fn requesting_from_yourself_is_refused() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);

        let result = fx.engine.create_request(
            &owner,
            NewTransferRequest {
                owner_id: owner.user_id,
                component_id: fx.component,
                from_location_id: None,
                to_location_id: None,
                quantity: 1,
                notes: None,
            },
        );
        assert!(is_unauthorized(result));
    }

    #[test]
    fn visibility_check_matches_request_participants() {
        let fx = Fixture::new();
        let pool = fx.user(Role::PIONEER);
        let co_manager = fx.user(Role::PIONEER);
        let requester = fx.user(Role::MEMBER);
        let bystander = fx.user(Role::MEMBER);
        let request = fx.request(&requester, &pool, 1);

        assert!(fx.engine.is_visible_to(&pool, request.id));
        assert!(fx.engine.is_visible_to(&co_manager, request.id));
        assert!(fx.engine.is_visible_to(&requester, request.id));
        assert!(!fx.engine.is_visible_to(&bystander, request.id));
        assert!(!fx.engine.is_visible_to(&requester, TransferRequestId::new()));

        assert!(is_unauthorized(fx.engine.get_request(&bystander, request.id)));
    }

    #[test]
    fn racing_updates_reach_subscribers_in_sequence_order() {
        let fx = Fixture::new();
        let owner = fx.user(Role::OFFICER);
        let requester = fx.user(Role::MEMBER);
        let subscription = fx.bus.subscribe();
        let request = fx.request(&requester, &owner, 1);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (fx, owner) = (&fx, &owner);
                scope.spawn(move || {
                    for i in 0..25 {
                        fx.engine
                            .comment_request(owner, request.id, None, Some(format!("{worker}-{i}")))
                            .unwrap();
                    }
                });
            }
            scope.spawn(|| {
                fx.engine.approve_request(&owner, request.id).unwrap();
            });
        });

        let mut seen = Vec::new();
        while let Ok(envelope) = subscription.recv_timeout(Duration::from_millis(200)) {
            seen.push(envelope.sequence_number());
        }
        let expected: Vec<u64> = (1..=102).collect();
        assert_eq!(seen, expected);
    }
}
