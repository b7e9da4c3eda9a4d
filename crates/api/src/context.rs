use quartermaster_auth::Actor;
use quartermaster_core::UserId;

/// The resolved acting user for a request.
///
/// Inserted by the actor middleware; present on every route behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
    display_name: String,
}

impl ActorContext {
    pub fn new(actor: Actor, display_name: impl Into<String>) -> Self {
        Self {
            actor,
            display_name: display_name.into(),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> UserId {
        self.actor.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}
