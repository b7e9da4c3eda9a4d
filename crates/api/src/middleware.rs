use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use quartermaster_auth::{Actor, IdentityDirectory};
use quartermaster_core::UserId;

use crate::context::ActorContext;

/// Header carrying the acting user's id, set by the upstream authenticator.
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone)]
pub struct ActorState {
    pub directory: Arc<dyn IdentityDirectory>,
}

pub async fn actor_middleware(
    State(state): State<ActorState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = extract_actor_id(req.headers())?;

    let profile = state.directory.profile(user_id).ok_or_else(|| {
        tracing::warn!(%user_id, "unknown actor");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(ActorContext::new(
        Actor::from(&profile),
        profile.display_name.clone(),
    ));

    Ok(next.run(req).await)
}

fn extract_actor_id(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    let header = headers.get(ACTOR_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    header.trim().parse().map_err(|_| StatusCode::UNAUTHORIZED)
}
