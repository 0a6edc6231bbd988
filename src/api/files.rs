// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File endpoints: upload, download, new versions, passphrases, listings.

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{DownloadLog, FileRecord, LifecycleStatus, VersionRecord},
    vault::{DownloadedFile, SoftDeleteOutcome, UpdateRequest, UpdatedFile, UploadRequest},
};

/// Header naming the version served by a version download.
pub const FILE_VERSION_HEADER: &str = "x-file-version";

// ========== Request Bodies ==========

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadFileRequest {
    pub file_name: String,
    /// Defaults to `application/octet-stream`.
    #[serde(default)]
    pub content_type: Option<String>,
    /// File content, standard base64.
    pub content: String,
    pub passphrase: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFileRequest {
    /// Keeps the current name when absent.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Keeps the current content type when absent.
    #[serde(default)]
    pub content_type: Option<String>,
    /// New content, standard base64.
    pub content: String,
    /// Must open the current version; the new version is encrypted with it.
    pub passphrase: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PassphraseRequest {
    pub passphrase: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePassphraseRequest {
    pub current_passphrase: String,
    pub new_passphrase: String,
}

// ========== Responses ==========

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub file_name: String,
    pub content_type: String,
    /// Plaintext size in bytes.
    pub size: u64,
    pub is_protected: bool,
    pub uploaded_at: DateTime<Utc>,
    pub status: LifecycleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            status: file.status(),
            deleted_at: file.deleted_at(),
            id: file.id,
            owner_id: file.owner_id,
            file_name: file.display_name,
            content_type: file.content_type,
            size: file.size,
            is_protected: file.is_protected,
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VersionResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub number: u32,
    pub created_at: DateTime<Utc>,
}

impl From<VersionRecord> for VersionResponse {
    fn from(version: VersionRecord) -> Self {
        Self {
            id: version.id,
            file_id: version.file_id,
            number: version.number,
            created_at: version.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdatedFileResponse {
    pub file: FileResponse,
    pub version: VersionResponse,
}

impl From<UpdatedFile> for UpdatedFileResponse {
    fn from(updated: UpdatedFile) -> Self {
        Self {
            file: updated.file.into(),
            version: updated.version.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadLogResponse {
    pub id: Uuid,
    pub user_id: String,
    pub file_id: Uuid,
    pub downloaded_at: DateTime<Utc>,
}

impl From<DownloadLog> for DownloadLogResponse {
    fn from(log: DownloadLog) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            file_id: log.file_id,
            downloaded_at: log.downloaded_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPassphraseResponse {
    pub valid: bool,
}

/// Soft delete result. `blob_relocated` is false when the File is trashed in
/// metadata but its content could not be moved.
#[derive(Debug, Serialize, ToSchema)]
pub struct SoftDeleteResponse {
    pub file: FileResponse,
    pub blob_relocated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<SoftDeleteOutcome> for SoftDeleteResponse {
    fn from(outcome: SoftDeleteOutcome) -> Self {
        Self {
            file: outcome.file.into(),
            blob_relocated: outcome.blob_relocated,
            warning: outcome.warning,
        }
    }
}

fn decode_content(content: &str) -> Result<Vec<u8>, ApiError> {
    Base64::decode_vec(content.trim())
        .map_err(|_| ApiError::bad_request("content must be standard base64"))
}

/// Raw bytes with the File's content type and an attachment disposition.
fn content_response(downloaded: DownloadedFile) -> Response {
    let content_type = HeaderValue::from_str(&downloaded.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment_name(&downloaded.file_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        downloaded.content,
    )
        .into_response();
    if let Some(version) = downloaded.version {
        response.headers_mut().insert(
            HeaderName::from_static(FILE_VERSION_HEADER),
            HeaderValue::from(version),
        );
    }
    response
}

/// Quotes, backslashes, control and non-ASCII characters become `_`.
fn attachment_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ========== Handlers ==========

#[utoipa::path(
    post,
    path = "/v1/files",
    request_body = UploadFileRequest,
    tag = "Files",
    responses(
        (status = 201, body = FileResponse),
        (status = 400, description = "Missing name, passphrase or content"),
        (status = 401, description = "No requester identity")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Auth(requester): Auth,
    Json(request): Json<UploadFileRequest>,
) -> Result<(StatusCode, Json<FileResponse>), ApiError> {
    let payload = decode_content(&request.content)?;
    let file = state
        .vault
        .upload(UploadRequest {
            owner_id: requester.user_id,
            file_name: request.file_name,
            content_type: request.content_type,
            payload,
            passphrase: request.passphrase,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(file.into())))
}

#[utoipa::path(
    get,
    path = "/v1/files",
    tag = "Files",
    responses((status = 200, body = [FileResponse]))
)]
pub async fn list_files(
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let files = state.vault.list_files(&requester).await?;
    Ok(Json(files.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/files/{file_id}",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Files",
    responses(
        (status = 200, body = FileResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Unknown file")
    )
)]
pub async fn get_file(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<FileResponse>, ApiError> {
    let file = state.vault.get_file(file_id, &requester).await?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/download",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    request_body = PassphraseRequest,
    tag = "Files",
    responses(
        (status = 200, description = "Decrypted content", content_type = "application/octet-stream"),
        (status = 403, description = "Incorrect passphrase or not the owner"),
        (status = 409, description = "File is in the trash"),
        (status = 410, description = "Stored content is missing")
    )
)]
pub async fn download_file(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
    Json(request): Json<PassphraseRequest>,
) -> Result<Response, ApiError> {
    let downloaded = state
        .vault
        .download(file_id, &request.passphrase, &requester)
        .await?;
    Ok(content_response(downloaded))
}

#[utoipa::path(
    put,
    path = "/v1/files/{file_id}",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    request_body = UpdateFileRequest,
    tag = "Files",
    responses(
        (status = 200, body = UpdatedFileResponse),
        (status = 403, description = "Incorrect passphrase or not the owner")
    )
)]
pub async fn update_file(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
    Json(request): Json<UpdateFileRequest>,
) -> Result<Json<UpdatedFileResponse>, ApiError> {
    let payload = decode_content(&request.content)?;
    let updated = state
        .vault
        .update(
            UpdateRequest {
                file_id,
                file_name: request.file_name,
                content_type: request.content_type,
                payload,
                passphrase: request.passphrase,
            },
            &requester,
        )
        .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/verify",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    request_body = PassphraseRequest,
    tag = "Files",
    responses((status = 200, body = VerifyPassphraseResponse))
)]
pub async fn verify_passphrase(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
    Json(request): Json<PassphraseRequest>,
) -> Result<Json<VerifyPassphraseResponse>, ApiError> {
    let valid = state
        .vault
        .verify_passphrase(file_id, &request.passphrase, &requester)
        .await?;
    Ok(Json(VerifyPassphraseResponse { valid }))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/passphrase",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    request_body = ChangePassphraseRequest,
    tag = "Files",
    responses(
        (status = 200, body = UpdatedFileResponse),
        (status = 403, description = "Current passphrase is incorrect")
    )
)]
pub async fn change_passphrase(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
    Json(request): Json<ChangePassphraseRequest>,
) -> Result<Json<UpdatedFileResponse>, ApiError> {
    let updated = state
        .vault
        .change_passphrase(
            file_id,
            &request.current_passphrase,
            &request.new_passphrase,
            &requester,
        )
        .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/files/{file_id}",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Files",
    responses(
        (status = 200, body = SoftDeleteResponse),
        (status = 409, description = "File is already in the trash")
    )
)]
pub async fn delete_file(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<SoftDeleteResponse>, ApiError> {
    let outcome = state.vault.soft_delete(file_id, &requester).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/v1/files/{file_id}/versions",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Versions",
    responses((status = 200, body = [VersionResponse]))
)]
pub async fn list_versions(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<Vec<VersionResponse>>, ApiError> {
    let versions = state.vault.list_versions(file_id, &requester).await?;
    Ok(Json(versions.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/files/{file_id}/versions/latest",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Versions",
    responses((status = 200, body = VersionResponse))
)]
pub async fn latest_version(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<VersionResponse>, ApiError> {
    let version = state.vault.latest_version(file_id, &requester).await?;
    Ok(Json(version.into()))
}

#[utoipa::path(
    post,
    path = "/v1/files/{file_id}/versions/{number}/download",
    params(
        ("file_id" = Uuid, Path, description = "File identifier"),
        ("number" = u32, Path, description = "Version number, starting at 1")
    ),
    request_body = PassphraseRequest,
    tag = "Versions",
    responses(
        (status = 200, description = "Decrypted content of the version", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown version")
    )
)]
pub async fn download_version(
    Path((file_id, number)): Path<(Uuid, u32)>,
    State(state): State<AppState>,
    Auth(requester): Auth,
    Json(request): Json<PassphraseRequest>,
) -> Result<Response, ApiError> {
    let downloaded = state
        .vault
        .read_version(file_id, number, &request.passphrase, &requester)
        .await?;
    Ok(content_response(downloaded))
}

#[utoipa::path(
    get,
    path = "/v1/files/{file_id}/downloads",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Files",
    responses((status = 200, body = [DownloadLogResponse]))
)]
pub async fn download_history(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<Vec<DownloadLogResponse>>, ApiError> {
    let logs = state.vault.download_history(file_id, &requester).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}
