use axum::{
    body::Body,
    extract::{Path as AxumPath, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::authz::{self, Role, RoleSet};
use super::chunked;
use super::errors::AppError;
use super::hierarchy::{FileEntry, FolderEntry};
use super::operations;
use super::path_utils::{has_dot_segments, normalize};
use super::share_token;
use super::store::{BodyStream, PutOptions};
use crate::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn into_body_stream(req: Request) -> BodyStream {
    Box::pin(
        req.into_body()
            .into_data_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from)),
    )
}

fn require_path(path: &str) -> Result<(), AppError> {
    if path.is_empty() {
        return Err(AppError::Validation("path must not be empty".into()));
    }
    if has_dot_segments(path) {
        return Err(AppError::Validation(
            "path must not contain '.' or '..' segments".into(),
        ));
    }
    Ok(())
}

fn required_param<'a>(
    params: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, AppError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("missing required parameter: {name}")))
}

fn required_u32(params: &HashMap<String, String>, name: &str) -> Result<u32, AppError> {
    required_param(params, name)?
        .parse::<u32>()
        .map_err(|_| AppError::Validation(format!("{name} must be a non-negative integer")))
}

// ── Listing ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    path: String,
}

#[derive(Serialize)]
pub struct ListResponse {
    path: String,
    folders: Vec<FolderEntry>,
    files: Vec<FileEntry>,
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    roles.require(Role::Reader)?;
    let folder = normalize(&query.path);
    tracing::info!(folder = %folder, "LIST request");

    let listing = operations::list_folder(state.store.as_ref(), &folder).await?;
    Ok(Json(ListResponse {
        path: folder,
        folders: listing.folders,
        files: listing.files,
    }))
}

// ── Download / existence / direct upload / delete ────

#[derive(Deserialize)]
pub struct DownloadQuery {
    token: Option<String>,
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    AxumPath(path): AxumPath<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let key = normalize(&path);
    require_path(&key)?;

    // A verified capability token stands in for role membership, but only
    // here and only for its exact bound path.
    let verified = query
        .token
        .as_deref()
        .and_then(|t| share_token::verify(t, &state.config.share_secret).ok());
    authz::allow_download(&roles, verified.as_ref(), &key)?;

    tracing::info!(key = %key, via_token = verified.is_some(), "GET request");

    let result = state
        .store
        .get_stream(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(key.clone()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        result
            .content_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(header::CONTENT_LENGTH, result.content_length.into());
    if let Ok(etag) = result.etag.parse() {
        headers.insert(header::ETAG, etag);
    }

    let body = Body::from_stream(result.body.map(|chunk| {
        chunk.map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { e.into() })
    }));
    Ok((StatusCode::OK, headers, body).into_response())
}

pub async fn head_file(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    AxumPath(path): AxumPath<String>,
) -> Result<StatusCode, AppError> {
    roles.require(Role::Reader)?;
    let key = normalize(&path);
    require_path(&key)?;

    if operations::object_exists(state.store.as_ref(), &key).await? {
        Ok(StatusCode::OK)
    } else {
        Err(AppError::NotFound(key))
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    path: String,
    etag: String,
}

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    AxumPath(path): AxumPath<String>,
    req: Request,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    roles.require(Role::Uploader)?;
    let key = normalize(&path);
    require_path(&key)?;

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let content_length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    tracing::info!(key = %key, content_type = %content_type, "PUT request");

    let opts = PutOptions {
        content_type: Some(content_type),
        content_length,
    };
    let etag = state
        .store
        .put_stream(&key, opts, into_body_stream(req))
        .await?;

    Ok((StatusCode::CREATED, Json(UploadResponse { path: key, etag })))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    AxumPath(path): AxumPath<String>,
) -> Result<StatusCode, AppError> {
    roles.require(Role::Admin)?;
    let key = normalize(&path);
    operations::delete_object(state.store.as_ref(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Move / rename ────────────────────────────────────

#[derive(Deserialize)]
pub struct MoveQuery {
    from: String,
    to: String,
}

#[derive(Serialize)]
pub struct MoveResponse {
    from: String,
    to: String,
}

pub async fn move_file(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(query): Query<MoveQuery>,
) -> Result<Json<MoveResponse>, AppError> {
    roles.require(Role::Uploader)?;
    let from = normalize(&query.from);
    let to = normalize(&query.to);
    tracing::info!(from = %from, to = %to, "MOVE request");

    operations::move_object(state.store.as_ref(), &from, &to).await?;
    Ok(Json(MoveResponse { from, to }))
}

// ── Folders ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct FolderQuery {
    path: String,
}

pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(query): Query<FolderQuery>,
) -> Result<StatusCode, AppError> {
    roles.require(Role::Uploader)?;
    let folder = normalize(&query.path);
    operations::create_folder(state.store.as_ref(), &folder).await?;
    Ok(StatusCode::CREATED)
}

pub async fn head_folder(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(query): Query<FolderQuery>,
) -> Result<StatusCode, AppError> {
    roles.require(Role::Reader)?;
    let folder = normalize(&query.path);
    if operations::folder_exists(state.store.as_ref(), &folder).await? {
        Ok(StatusCode::OK)
    } else {
        Err(AppError::NotFound(folder))
    }
}

pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(query): Query<FolderQuery>,
) -> Result<StatusCode, AppError> {
    roles.require(Role::Admin)?;
    let folder = normalize(&query.path);
    operations::delete_folder(state.store.as_ref(), &folder).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Chunked upload ───────────────────────────────────
//
// Chunk parameters travel as query parameters and are validated by hand so
// a missing or malformed field comes back as our own validation error, not
// a framework rejection.

#[derive(Serialize)]
pub struct StageResponse {
    path: String,
    chunk_index: u32,
    total_chunks: u32,
}

pub async fn stage_chunk(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(params): Query<HashMap<String, String>>,
    req: Request,
) -> Result<(StatusCode, Json<StageResponse>), AppError> {
    roles.require(Role::Uploader)?;
    let key = normalize(required_param(&params, "path")?);
    require_path(&key)?;
    let chunk_index = required_u32(&params, "chunk_index")?;
    let total_chunks = required_u32(&params, "total_chunks")?;

    let bytes = axum::body::to_bytes(req.into_body(), state.config.max_body_bytes)
        .await
        .map_err(|e| AppError::Validation(format!("unreadable chunk body: {e}")))?;

    tracing::info!(
        key = %key,
        chunk_index,
        total_chunks,
        bytes = bytes.len(),
        "STAGE request"
    );

    chunked::stage_chunk(state.store.as_ref(), &key, chunk_index, total_chunks, bytes).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StageResponse {
            path: key,
            chunk_index,
            total_chunks,
        }),
    ))
}

#[derive(Serialize)]
pub struct CommitResponse {
    path: String,
    total_chunks: u32,
}

pub async fn commit_upload(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, Json<CommitResponse>), AppError> {
    roles.require(Role::Uploader)?;
    let key = normalize(required_param(&params, "path")?);
    require_path(&key)?;
    let total_chunks = required_u32(&params, "total_chunks")?;
    let content_type = params
        .get("content_type")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    tracing::info!(key = %key, total_chunks, "COMMIT request");

    chunked::commit_upload(state.store.as_ref(), &key, total_chunks, content_type).await?;
    Ok((
        StatusCode::CREATED,
        Json(CommitResponse {
            path: key,
            total_chunks,
        }),
    ))
}

// ── Share tokens ─────────────────────────────────────

#[derive(Serialize)]
pub struct ShareResponse {
    path: String,
    token: String,
    url: String,
    expires_in_secs: i64,
}

pub async fn issue_share_token(
    State(state): State<Arc<AppState>>,
    Extension(roles): Extension<RoleSet>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<ShareResponse>, AppError> {
    roles.require(Role::Reader)?;
    let key = normalize(&query.path);
    require_path(&key)?;

    if !operations::object_exists(state.store.as_ref(), &key).await? {
        return Err(AppError::NotFound(key));
    }

    let ttl = state.config.share_ttl_secs;
    let token = share_token::issue(&key, &state.config.share_secret, ttl);
    let url = format!("/api/v1/file/{key}?token={token}");
    tracing::info!(key = %key, ttl, "share token issued");

    Ok(Json(ShareResponse {
        path: key,
        token,
        url,
        expires_in_secs: ttl,
    }))
}
