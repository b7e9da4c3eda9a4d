//! Shared checks run at the top of every service operation.

use quartermaster_auth::{Actor, IdentityDirectory, ResourceContext, UserProfile, authorize};
use quartermaster_core::{ComponentId, DomainError, LocationId, UserId};

use crate::catalog::Catalog;
use crate::error::ServiceResult;

/// [`authorize`], with denials logged.
pub(crate) fn permit(actor: &Actor, context: ResourceContext) -> ServiceResult<()> {
    authorize(actor, &context).map_err(|err| {
        tracing::warn!(actor = %actor.user_id, ?context, "authorization denied: {err}");
        err.into()
    })
}

pub(crate) fn known_user(directory: &dyn IdentityDirectory, user_id: UserId) -> ServiceResult<UserProfile> {
    directory
        .profile(user_id)
        .ok_or_else(|| DomainError::not_found(format!("user {user_id}")).into())
}

pub(crate) fn known_component(catalog: &dyn Catalog, component_id: ComponentId) -> ServiceResult<()> {
    if catalog.has_component(component_id) {
        Ok(())
    } else {
        Err(DomainError::not_found(format!("component {component_id}")).into())
    }
}

/// `None` (unlocated) is always valid.
pub(crate) fn known_location(catalog: &dyn Catalog, location_id: Option<LocationId>) -> ServiceResult<()> {
    match location_id {
        Some(id) if !catalog.has_location(id) => {
            Err(DomainError::not_found(format!("location {id}")).into())
        }
        _ => Ok(()),
    }
}

/// Trim free text; blank becomes `None`.
pub(crate) fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}
