use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{Capability, CapabilitySet};

/// Role identifier as reported by the identity service.
///
/// Roles are opaque strings; only the ones listed in [`Role::capabilities`]
/// grant anything. Unknown roles (e.g. "member", "recruit") grant nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const MEMBER: Role = Role(Cow::Borrowed("member"));
    pub const OFFICER: Role = Role(Cow::Borrowed("officer"));
    pub const PIONEER: Role = Role(Cow::Borrowed("pioneer"));
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Capabilities granted by this role.
    ///
    /// The hierarchy is cumulative: pioneers manage their own stock, admins
    /// can do everything a pioneer can.
    pub fn capabilities(&self) -> CapabilitySet {
        match self.as_str() {
            "officer" => CapabilitySet::from_iter([Capability::Manage]),
            "pioneer" => CapabilitySet::from_iter([Capability::Manage, Capability::Pioneer]),
            "admin" => CapabilitySet::from_iter([
                Capability::Manage,
                Capability::Pioneer,
                Capability::Admin,
            ]),
            _ => CapabilitySet::default(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_hierarchy_is_cumulative() {
        assert!(Role::MEMBER.capabilities().is_empty());
        assert!(Role::OFFICER.capabilities().contains(Capability::Manage));
        assert!(!Role::OFFICER.capabilities().contains(Capability::Pioneer));
        assert!(Role::PIONEER.capabilities().contains(Capability::Pioneer));
        assert!(!Role::PIONEER.capabilities().contains(Capability::Admin));

        let admin = Role::ADMIN.capabilities();
        assert!(admin.contains(Capability::Manage));
        assert!(admin.contains(Capability::Pioneer));
        assert!(admin.contains(Capability::Admin));
    }

    #[test]
    fn roles_serialize_as_plain_strings() {
        let json = serde_json::to_string(&vec![Role::OFFICER, Role::new("quartermaster")]).unwrap();
        assert_eq!(json, r#"["officer","quartermaster"]"#);
    }
}
