// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::files::FileResponse;
use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    vault::{BatchReport, PurgeOutcome},
};

#[utoipa::path(
    get,
    path = "/v1/trash",
    tag = "Trash",
    responses((status = 200, description = "Own trashed files; every trashed file for admins", body = [FileResponse]))
)]
pub async fn list_trash(
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let files = state.vault.list_trash(&requester).await?;
    Ok(Json(files.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/trash/{file_id}/restore",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Trash",
    responses(
        (status = 200, body = FileResponse),
        (status = 409, description = "Not in the trash, or trashed content is missing")
    )
)]
pub async fn restore_file(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<FileResponse>, ApiError> {
    let file = state.vault.restore(file_id, &requester).await?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    post,
    path = "/v1/trash/restore",
    tag = "Trash",
    responses((status = 200, body = BatchReport))
)]
pub async fn restore_all(
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<BatchReport>, ApiError> {
    Ok(Json(state.vault.restore_all(&requester).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/trash/{file_id}",
    params(("file_id" = Uuid, Path, description = "File identifier")),
    tag = "Trash",
    responses(
        (status = 200, body = PurgeOutcome),
        (status = 409, description = "File is not in the trash")
    )
)]
pub async fn purge_file(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<PurgeOutcome>, ApiError> {
    Ok(Json(state.vault.purge(file_id, &requester).await?))
}

#[utoipa::path(
    delete,
    path = "/v1/trash",
    tag = "Trash",
    responses((status = 200, body = BatchReport))
)]
pub async fn purge_all(
    State(state): State<AppState>,
    Auth(requester): Auth,
) -> Result<Json<BatchReport>, ApiError> {
    Ok(Json(state.vault.purge_all(&requester).await?))
}
