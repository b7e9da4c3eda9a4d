use serde::{Deserialize, Serialize};

use quartermaster_core::UserId;

use crate::{Capability, CapabilitySet, Role};

/// A user as reported by the identity/role service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Capabilities granted directly, on top of what the roles imply.
    #[serde(default)]
    pub grants: CapabilitySet,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    pub fn new(user_id: UserId, display_name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            roles,
            grants: CapabilitySet::default(),
            active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Union of role-derived capabilities and direct grants.
    pub fn capabilities(&self) -> CapabilitySet {
        self.roles
            .iter()
            .fold(self.grants.clone(), |acc, role| acc.union(&role.capabilities()))
    }

    pub fn can_manage(&self) -> bool {
        self.capabilities().contains(Capability::Manage)
    }

    pub fn is_pioneer(&self) -> bool {
        self.capabilities().contains(Capability::Pioneer)
    }

    pub fn is_admin(&self) -> bool {
        self.capabilities().contains(Capability::Admin)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// The resolved identity performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub capabilities: CapabilitySet,
    pub active: bool,
}

impl Actor {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

impl From<&UserProfile> for Actor {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            capabilities: profile.capabilities(),
            active: profile.active,
        }
    }
}

/// Identity/role service boundary (read-only).
pub trait IdentityDirectory: Send + Sync {
    fn profile(&self, user_id: UserId) -> Option<UserProfile>;

    /// Resolve a user into an [`Actor`] for authorization.
    fn actor(&self, user_id: UserId) -> Option<Actor> {
        self.profile(user_id).as_ref().map(Actor::from)
    }
}

impl<D> IdentityDirectory for std::sync::Arc<D>
where
    D: IdentityDirectory + ?Sized,
{
    fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        (**self).profile(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_grants_add_to_role_capabilities() {
        let mut profile = UserProfile::new(UserId::new(), "Vex", vec![Role::OFFICER]);
        assert!(profile.can_manage());
        assert!(!profile.is_pioneer());

        profile.grants.insert(Capability::Pioneer);
        assert!(profile.is_pioneer());
        assert!(!profile.is_admin());
    }

    #[test]
    fn profile_defaults_to_active_when_deserialized() {
        let id = UserId::new();
        let json = format!(r#"{{"user_id":"{id}","display_name":"Rook","roles":["member"]}}"#);
        let profile: UserProfile = serde_json::from_str(&json).unwrap();
        assert!(profile.is_active());
        assert!(profile.capabilities().is_empty());
    }
}
