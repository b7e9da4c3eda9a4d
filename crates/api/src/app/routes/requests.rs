use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, sse::Event as SseEvent},
    routing::{get, post},
};

use quartermaster_core::TransferRequestId;
use quartermaster_infra::transfer_engine::NewTransferRequest;
use quartermaster_inventory::RequestFilter;

use crate::app::services::{self, AppServices};
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_request).get(list_requests))
        .route("/search", get(search_requests))
        .route("/pending-counts", get(pending_counts))
        .route("/stream", get(stream))
        .route("/:id", get(get_request))
        .route("/:id/approve", post(approve_request))
        .route("/:id/reject", post(reject_request))
        .route("/:id/deliver", post(deliver_request))
        .route("/:id/confirm", post(confirm_receipt))
        .route("/:id/comment", post(comment_request))
}

fn request_id(raw: &str) -> Result<TransferRequestId, axum::response::Response> {
    errors::parse_id(raw, "request")
}

pub async fn create_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<NewTransferRequest>,
) -> axum::response::Response {
    match services.engine.create_request(ctx.actor(), body) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(filter): Query<RequestFilter>,
) -> axum::response::Response {
    match services.engine.list_requests(ctx.actor(), &filter) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn search_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(query): Query<dto::SearchQuery>,
) -> axum::response::Response {
    match services.engine.search_by_order_number(ctx.actor(), &query.q) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn pending_counts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> axum::response::Response {
    match services.pending.pending_counts(ctx.actor()) {
        Ok(counts) => Json(serde_json::json!({
            "counts": counts,
            "total": counts.total(),
        }))
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    services::request_sse_stream(services, ctx.actor().clone())
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.get_request(ctx.actor(), id) {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn approve_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.approve_request(ctx.actor(), id) {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reject_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectBody>,
) -> axum::response::Response {
    let id = match request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.reject_request(ctx.actor(), id, body.reason) {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn deliver_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.deliver_request(ctx.actor(), id) {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn confirm_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.confirm_receipt(ctx.actor(), id) {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn comment_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CommentBody>,
) -> axum::response::Response {
    let id = match request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .engine
        .comment_request(ctx.actor(), id, body.pioneer_comment, body.public_comment)
    {
        Ok(request) => Json(request).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
