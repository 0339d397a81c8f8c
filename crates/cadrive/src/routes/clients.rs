//! Client drive lifecycle routes (practice staff only)

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    routing::{delete, post},
    Json, Router,
};

use super::{parse_object_id, require_staff, AppState};
use crate::error::DriveResult;
use crate::services::{ProvisionReport, RemovalReport};
use crate::AuthenticatedPrincipal;

pub fn client_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clients/{client_id}/provision", post(provision_client))
        .route("/clients/{client_id}", delete(remove_client))
}

async fn provision_client(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(client_id): Path<String>,
) -> DriveResult<Json<ProvisionReport>> {
    require_staff(&principal, "provision client drives")?;
    let client_id = parse_object_id(&client_id)?;
    let client = state.authorize_client(&principal, &client_id).await?;

    let report = state
        .client_service()
        .provision(&client, &principal.actor, state.config.today())
        .await?;
    Ok(Json(report))
}

async fn remove_client(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(client_id): Path<String>,
) -> DriveResult<Json<RemovalReport>> {
    require_staff(&principal, "remove client drives")?;
    let client_id = parse_object_id(&client_id)?;
    let client = state.authorize_client(&principal, &client_id).await?;

    let report = state
        .client_service()
        .remove_client(&client, &principal.actor)
        .await?;
    Ok(Json(report))
}
