//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/engine wiring and the realtime fan-out
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request bodies and query strings
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use quartermaster_auth::IdentityDirectory;
use quartermaster_infra::config::{AppConfig, ConfigError};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, ConfigError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router_for(services))
}

/// Router over an already-built service graph.
pub fn router_for(services: Arc<services::AppServices>) -> Router {
    let directory: Arc<dyn IdentityDirectory> = services.directory.clone();
    let actor_state = middleware::ActorState { directory };

    // Protected routes: require a known actor.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            actor_state,
            middleware::actor_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
