use thiserror::Error;

use quartermaster_core::{DomainError, UserId};

use crate::{Actor, Capability};

/// What an operation is about to touch, as far as authorization cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceContext {
    /// Reading ledger rows (any owner, or all of them).
    InventoryRead,
    /// Mutating the ledger entries of `owner`.
    Inventory { owner: UserId },
    /// Reading the audit history of `owner`.
    InventoryHistory { owner: UserId },
    /// Opening a transfer request against stock held by `owner`.
    RequestCreate { owner: UserId },
    /// Owner-side request actions: approve, reject, deliver, comment.
    RequestReview { owner: UserId, owner_is_pioneer: bool },
    /// Confirming receipt of a delivered request.
    RequestReceipt { requester: UserId, requester_active: bool },
    /// Reading a single request.
    RequestView {
        owner: UserId,
        owner_is_pioneer: bool,
        requester: UserId,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("account is inactive")]
    Inactive,

    #[error("missing capability '{0}'")]
    MissingCapability(Capability),

    #[error("{0}")]
    NotParticipant(&'static str),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// True when `actor` may act for the owner of a request: the owner itself,
/// a pioneer co-managing pool stock (owned by another pioneer), or an admin.
pub fn is_owner_side(actor: &Actor, owner: UserId, owner_is_pioneer: bool) -> bool {
    actor.user_id == owner
        || (owner_is_pioneer && actor.has(Capability::Pioneer))
        || actor.has(Capability::Admin)
}

/// Whether `actor` may read a request between `owner` and `requester`.
///
/// Same answer as [`authorize`] with [`ResourceContext::RequestView`], as a
/// plain predicate for filtering.
pub fn can_view_request(actor: &Actor, owner: UserId, owner_is_pioneer: bool, requester: UserId) -> bool {
    actor.active && (actor.user_id == requester || is_owner_side(actor, owner, owner_is_pioneer))
}

/// The single capability check applied by every inventory/request operation.
///
/// - No IO
/// - No panics
/// - No business rules beyond who-may-touch-what
pub fn authorize(actor: &Actor, context: &ResourceContext) -> Result<(), AuthzError> {
    if !actor.active {
        return Err(AuthzError::Inactive);
    }

    match *context {
        ResourceContext::InventoryRead => Ok(()),
        ResourceContext::Inventory { owner } => {
            let required = if actor.user_id == owner {
                Capability::Manage
            } else {
                Capability::Admin
            };
            if actor.has(required) {
                Ok(())
            } else {
                Err(AuthzError::MissingCapability(required))
            }
        }
        ResourceContext::InventoryHistory { owner } => {
            if actor.user_id == owner || actor.has(Capability::Admin) {
                Ok(())
            } else {
                Err(AuthzError::MissingCapability(Capability::Admin))
            }
        }
        ResourceContext::RequestCreate { owner } => {
            if actor.user_id == owner {
                Err(AuthzError::NotParticipant("cannot request stock from yourself"))
            } else {
                Ok(())
            }
        }
        ResourceContext::RequestReview {
            owner,
            owner_is_pioneer,
        } => {
            if is_owner_side(actor, owner, owner_is_pioneer) {
                Ok(())
            } else {
                Err(AuthzError::NotParticipant(
                    "only the owner, a pool pioneer or an admin may act on this request",
                ))
            }
        }
        ResourceContext::RequestReceipt {
            requester,
            requester_active,
        } => {
            if actor.user_id == requester
                || (!requester_active && actor.has(Capability::Admin))
            {
                Ok(())
            } else {
                Err(AuthzError::NotParticipant(
                    "only the requester (or an admin for an inactive requester) may confirm receipt",
                ))
            }
        }
        ResourceContext::RequestView {
            owner,
            owner_is_pioneer,
            requester,
        } => {
            if can_view_request(actor, owner, owner_is_pioneer, requester) {
                Ok(())
            } else {
                Err(AuthzError::NotParticipant("not a participant in this request"))
            }
        }
    }
}
