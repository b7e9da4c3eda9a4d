//! `quartermaster-auth`: capability resolution and the single authorization check.
//!
//! This crate is intentionally decoupled from HTTP and storage: identities are
//! resolved through the [`IdentityDirectory`] trait and every operation asks
//! [`authorize`] with a [`ResourceContext`] describing what it touches.

pub mod actor;
pub mod authorize;
pub mod capabilities;
pub mod roles;

pub use actor::{Actor, IdentityDirectory, UserProfile};
pub use authorize::{AuthzError, ResourceContext, authorize, can_view_request, is_owner_side};
pub use capabilities::{Capability, CapabilitySet};
pub use roles::Role;
