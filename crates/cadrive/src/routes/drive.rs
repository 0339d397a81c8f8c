//! Drive routes - browsing, uploads, folder creation, soft delete, download

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

use super::{parse_object_id, AppState};
use crate::error::{DriveError, DriveResult};
use crate::models::{Category, DocumentSummary, FolderSummary, ItemKind, NewUpload, UploaderRole};
use crate::services::{ClientDriveContents, FolderContents, FolderQuery};
use crate::AuthenticatedPrincipal;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderContentsRequest {
    pub folder_id: Option<String>,
    pub category: Option<String>,
    pub fiscal_year: Option<String>,
    /// Required for staff; client principals default to themselves
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub client_id: String,
    pub parent_folder_id: Option<String>,
}

pub fn drive_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/folder-contents", post(folder_contents))
        .route("/clients/{client_id}/all-data", get(all_data))
        .route("/upload", post(upload))
        .route("/folders", post(create_folder))
        .route("/folders/{id}", delete(delete_folder))
        .route("/documents/{id}", delete(delete_document))
        .route("/documents/{id}/download", get(download))
}

fn parse_category(value: Option<&str>) -> DriveResult<Option<Category>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<Category>().map_err(DriveError::Validation))
        .transpose()
}

fn parse_optional_id(value: Option<&str>) -> DriveResult<Option<mongodb::bson::oid::ObjectId>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(parse_object_id)
        .transpose()
}

fn folder_query(
    folder_id: Option<&str>,
    category: Option<&str>,
    fiscal_year: Option<&str>,
) -> DriveResult<FolderQuery> {
    Ok(FolderQuery {
        folder_id: parse_optional_id(folder_id)?,
        category: parse_category(category)?,
        fiscal_year: fiscal_year
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    })
}

async fn folder_contents(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Json(req): Json<FolderContentsRequest>,
) -> DriveResult<Json<FolderContents>> {
    let client = state
        .authorize_request_client(&principal, req.client_id.as_deref())
        .await?;
    let query = folder_query(
        req.folder_id.as_deref(),
        req.category.as_deref(),
        req.fiscal_year.as_deref(),
    )?;

    let contents = state
        .folder_service()
        .list_contents(&client, &query, state.config.today())
        .await?;
    Ok(Json(contents))
}

async fn all_data(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(client_id): Path<String>,
) -> DriveResult<Json<ClientDriveContents>> {
    let client_id = parse_object_id(&client_id)?;
    let client = state.authorize_client(&principal, &client_id).await?;
    Ok(Json(state.folder_service().all_contents(&client).await?))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    mut multipart: Multipart,
) -> DriveResult<(StatusCode, Json<DocumentSummary>)> {
    let mut file: Option<(String, String, bytes::Bytes)> = None;
    let mut folder_id: Option<String> = None;
    let mut category: Option<String> = None;
    let mut fiscal_year: Option<String> = None;
    let mut client_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DriveError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("unknown").to_string();
                let mime_type = field.content_type().unwrap_or(OCTET_STREAM).to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| DriveError::Validation(e.to_string()))?;
                file = Some((file_name, mime_type, data));
            }
            "folderId" => folder_id = Some(field.text().await.unwrap_or_default()),
            "category" => category = Some(field.text().await.unwrap_or_default()),
            "fiscalYear" => fiscal_year = Some(field.text().await.unwrap_or_default()),
            "clientId" => client_id = Some(field.text().await.unwrap_or_default()),
            _ => {}
        }
    }

    let (file_name, mut mime_type, data) =
        file.ok_or_else(|| DriveError::Validation("No file".into()))?;
    if data.is_empty() {
        return Err(DriveError::Validation("Uploaded file is empty".into()));
    }

    // Browsers often send octet-stream for common document types
    if mime_type == OCTET_STREAM || mime_type.is_empty() {
        if let Some(guessed) = mime_guess::from_path(&file_name).first_raw() {
            mime_type = guessed.to_string();
        }
    }

    let client = state
        .authorize_request_client(&principal, client_id.as_deref())
        .await?;
    let target = folder_query(folder_id.as_deref(), category.as_deref(), fiscal_year.as_deref())?;
    let upload = NewUpload {
        file_name,
        content_type: mime_type,
        data,
        uploaded_by: if principal.is_staff() {
            UploaderRole::Staff
        } else {
            UploaderRole::Client
        },
        uploader_id: principal.actor.clone(),
    };

    let document = state
        .document_service()
        .upload(&client, &target, upload, state.config.today())
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Json(req): Json<CreateFolderRequest>,
) -> DriveResult<(StatusCode, Json<FolderSummary>)> {
    req.validate()
        .map_err(|e| DriveError::Validation(e.to_string()))?;

    let client = state
        .authorize_request_client(&principal, Some(&req.client_id))
        .await?;
    let parent = parse_optional_id(req.parent_folder_id.as_deref())?;

    let folder = state
        .folder_service()
        .create_folder(&client.id, &req.name, parent.as_ref(), &principal.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(FolderSummary::from(folder))))
}

async fn soft_delete(
    state: &AppState,
    principal: &AuthenticatedPrincipal,
    kind: ItemKind,
    id: &str,
) -> DriveResult<StatusCode> {
    let id = parse_object_id(id)?;
    let bin = state.recycle_bin_service();
    let owner = bin.owner_of(kind, &id).await?;
    let client = state.authorize_client(principal, &owner).await?;
    bin.soft_delete(&client, kind, &id, &principal.actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
) -> DriveResult<StatusCode> {
    soft_delete(&state, &principal, ItemKind::Folder, &id).await
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
) -> DriveResult<StatusCode> {
    soft_delete(&state, &principal, ItemKind::Document, &id).await
}

fn attachment_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

async fn download(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
) -> DriveResult<Response> {
    let id = parse_object_id(&id)?;
    let owner = state
        .recycle_bin_service()
        .owner_of(ItemKind::Document, &id)
        .await?;
    let client = state.authorize_client(&principal, &owner).await?;

    let (document, object) = state.document_service().download(&client, &id).await?;
    let content_type = object
        .content_type
        .unwrap_or_else(|| document.content_type.clone());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&document.file_name),
        );
    if let Some(length) = object.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(object.stream))
        .map_err(|e| DriveError::Internal(e.to_string()))
}
