// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    state::AppState,
    storage::LifecycleStatus,
    vault::{BatchFailure, BatchReport, PurgeOutcome},
};

pub mod files;
pub mod health;
pub mod trash;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    let v1_routes = Router::new()
        .route("/files", get(files::list_files).post(files::upload_file))
        .route(
            "/files/{file_id}",
            get(files::get_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route("/files/{file_id}/download", post(files::download_file))
        .route("/files/{file_id}/verify", post(files::verify_passphrase))
        .route("/files/{file_id}/passphrase", post(files::change_passphrase))
        .route("/files/{file_id}/versions", get(files::list_versions))
        .route("/files/{file_id}/versions/latest", get(files::latest_version))
        .route(
            "/files/{file_id}/versions/{number}/download",
            post(files::download_version),
        )
        .route("/files/{file_id}/downloads", get(files::download_history))
        .route("/trash", get(trash::list_trash).delete(trash::purge_all))
        .route("/trash/restore", post(trash::restore_all))
        .route("/trash/{file_id}", delete(trash::purge_file))
        .route("/trash/{file_id}/restore", post(trash::restore_file))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        files::upload_file,
        files::list_files,
        files::get_file,
        files::download_file,
        files::update_file,
        files::verify_passphrase,
        files::change_passphrase,
        files::delete_file,
        files::list_versions,
        files::latest_version,
        files::download_version,
        files::download_history,
        trash::list_trash,
        trash::restore_file,
        trash::restore_all,
        trash::purge_file,
        trash::purge_all,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            files::UploadFileRequest,
            files::UpdateFileRequest,
            files::PassphraseRequest,
            files::ChangePassphraseRequest,
            files::FileResponse,
            files::VersionResponse,
            files::UpdatedFileResponse,
            files::DownloadLogResponse,
            files::VerifyPassphraseResponse,
            files::SoftDeleteResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            BatchReport,
            BatchFailure,
            PurgeOutcome,
            LifecycleStatus
        )
    ),
    tags(
        (name = "Files", description = "Encrypted file upload, download and passphrases"),
        (name = "Versions", description = "Version history"),
        (name = "Trash", description = "Soft delete, restore and purge"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
