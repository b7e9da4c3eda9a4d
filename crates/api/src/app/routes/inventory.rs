use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use quartermaster_core::{EntryId, UserId};
use quartermaster_infra::movement::{AddStock, RemoveStock, TransferStock};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_all))
        .route("/:owner_id", get(list_for_owner))
        .route("/:owner_id/history", get(history))
        .route("/:owner_id/add", post(add_stock))
        .route("/:owner_id/remove", post(remove_stock))
        .route("/:owner_id/transfer", post(transfer_stock))
        .route("/:owner_id/entries/:entry_id/move", post(move_entry))
        .route("/:owner_id/bulk-move", post(bulk_move))
        .route("/:owner_id/patch-reset", post(patch_reset))
}

pub async fn list_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> axum::response::Response {
    match services.movement.get_all_inventory(ctx.actor()) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_for_owner(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movement.get_inventory(ctx.actor(), owner_id) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movement.get_history(ctx.actor(), owner_id) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn add_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
    Json(body): Json<dto::AddStockBody>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = AddStock {
        owner_id,
        component_id: body.component_id,
        location_id: body.location_id,
        quantity: body.quantity,
        source: body.source,
        notes: body.notes,
    };

    match services.movement.add(ctx.actor(), cmd) {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn remove_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
    Json(body): Json<dto::RemoveStockBody>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = RemoveStock {
        owner_id,
        component_id: body.component_id,
        location_id: body.location_id,
        quantity: body.quantity,
        notes: body.notes,
    };

    match services.movement.remove(ctx.actor(), cmd) {
        Ok(remaining) => Json(serde_json::json!({ "remaining": remaining })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn transfer_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
    Json(body): Json<dto::TransferBody>,
) -> axum::response::Response {
    let from_owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = TransferStock {
        from_owner_id,
        to_owner_id: body.to_owner_id,
        component_id: body.component_id,
        quantity: body.quantity,
        from_location_id: body.from_location_id,
        to_location_id: body.to_location_id,
        notes: body.notes,
    };

    match services.movement.transfer(ctx.actor(), cmd) {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn move_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path((owner_id, entry_id)): Path<(String, String)>,
    Json(body): Json<dto::MoveEntryBody>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let entry_id: EntryId = match errors::parse_id(&entry_id, "entry") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movement.move_location(
        ctx.actor(),
        owner_id,
        entry_id,
        body.to_location_id,
        body.quantity,
    ) {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn bulk_move(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
    Json(body): Json<dto::BulkMoveBody>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movement.bulk_move_location(
        ctx.actor(),
        owner_id,
        body.from_location_id,
        body.to_location_id,
    ) {
        Ok(moved) => Json(serde_json::json!({ "moved": moved })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn patch_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(owner_id): Path<String>,
    Json(body): Json<dto::PatchResetBody>,
) -> axum::response::Response {
    let owner_id: UserId = match errors::parse_id(&owner_id, "owner") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.movement.patch_reset(
        ctx.actor(),
        owner_id,
        body.location_id,
        &body.kept_entry_ids,
    ) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
