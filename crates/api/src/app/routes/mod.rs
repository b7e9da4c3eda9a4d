use axum::{Router, routing::get};

pub mod inventory;
pub mod requests;
pub mod system;

/// Router for all endpoints that need a resolved actor.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/requests", requests::router())
}
