// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::vault::VaultError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match &err {
            VaultError::Validation { .. } => Self::bad_request(err.to_string()),
            VaultError::WrongPassphraseOrCorruptBlob | VaultError::PermissionDenied(_) => {
                Self::forbidden(err.to_string())
            }
            VaultError::FileNotFound(_) | VaultError::VersionNotFound { .. } => {
                Self::not_found(err.to_string())
            }
            VaultError::BlobMissing { .. } => Self::new(StatusCode::GONE, err.to_string()),
            VaultError::RestoreSourceMissing(_) | VaultError::InvalidState { .. } => {
                Self::conflict(err.to_string())
            }
            VaultError::Timeout(_) | VaultError::Cancelled => Self::unavailable(err.to_string()),
            VaultError::Metadata(inner) if inner.is_conflict() => Self::conflict(err.to_string()),
            VaultError::Io(_)
            | VaultError::Metadata(_)
            | VaultError::Crypto(_)
            | VaultError::Internal(_) => {
                tracing::error!(error = %err, "Vault operation failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
