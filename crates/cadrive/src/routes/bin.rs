//! Recycle bin routes

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};

use super::{parse_object_id, require_staff, AppState};
use crate::error::{DriveError, DriveResult};
use crate::models::ItemKind;
use crate::services::BinContents;
use crate::AuthenticatedPrincipal;

pub fn bin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bin/{client_id}", get(list_bin))
        .route("/restore/{kind}/{id}", put(restore))
        .route("/permanent/{kind}/{id}", delete(permanent_delete))
}

fn parse_kind(kind: &str) -> DriveResult<ItemKind> {
    kind.parse::<ItemKind>().map_err(DriveError::Validation)
}

async fn list_bin(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(client_id): Path<String>,
) -> DriveResult<Json<BinContents>> {
    let client_id = parse_object_id(&client_id)?;
    let client = state.authorize_client(&principal, &client_id).await?;
    Ok(Json(state.recycle_bin_service().list_bin(&client).await?))
}

async fn restore(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path((kind, id)): Path<(String, String)>,
) -> DriveResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    let id = parse_object_id(&id)?;
    let bin = state.recycle_bin_service();
    let owner = bin.owner_of(kind, &id).await?;
    let client = state.authorize_client(&principal, &owner).await?;
    bin.restore(&client, kind, &id, &principal.actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn permanent_delete(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path((kind, id)): Path<(String, String)>,
) -> DriveResult<StatusCode> {
    let kind = parse_kind(&kind)?;
    let id = parse_object_id(&id)?;
    let bin = state.recycle_bin_service();
    let owner = bin.owner_of(kind, &id).await?;
    let client = state.authorize_client(&principal, &owner).await?;
    require_staff(&principal, "permanently delete items")?;
    bin.permanent_delete(&client, kind, &id, &principal.actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
