use std::collections::HashMap;
use std::sync::RwLock;

use quartermaster_auth::{IdentityDirectory, UserProfile};
use quartermaster_core::{DomainError, UserId};

use crate::error::{ServiceError, ServiceResult};

/// In-memory user directory backing actor resolution and pool lookups.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    users: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: UserProfile) -> ServiceResult<()> {
        let mut users = self
            .users
            .write()
            .map_err(|_| ServiceError::poisoned("identity directory"))?;
        users.insert(profile.user_id, profile);
        Ok(())
    }

    /// Mark a user inactive. Their stock and requests stay where they are.
    pub fn deactivate(&self, user_id: UserId) -> ServiceResult<UserProfile> {
        let mut users = self
            .users
            .write()
            .map_err(|_| ServiceError::poisoned("identity directory"))?;
        let profile = users
            .get_mut(&user_id)
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        profile.active = false;
        Ok(profile.clone())
    }

    pub fn all(&self) -> Vec<UserProfile> {
        self.users
            .read()
            .map(|u| u.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn profile(&self, user_id: UserId) -> Option<UserProfile> {
        self.users.read().ok()?.get(&user_id).cloned()
    }
}
