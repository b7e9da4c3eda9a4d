use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A named permission checked before every core operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Mutate one's own inventory (officer-equivalent).
    Manage,
    /// Hold and distribute organization pool stock; co-manage pool requests.
    Pioneer,
    /// Act on anyone's inventory and on behalf of inactive members.
    Admin,
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Capability::Manage => "manage",
            Capability::Pioneer => "pioneer",
            Capability::Admin => "admin",
        })
    }
}

/// Effective capabilities of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn union(mut self, other: &CapabilitySet) -> Self {
        self.0.extend(other.0.iter().copied());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
