// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the requesting user.
//!
//! Use the `Auth` extractor in handlers to require an identity:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(requester): Auth) -> impl IntoResponse {
//!     // requester is Requester
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, Requester, Role};

/// Header carrying the canonical user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the user's role. Absent means `client`.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor for the requesting user.
///
/// The vault sits behind a gateway that has already authenticated the
/// caller; the gateway forwards the result in `x-user-id` and
/// `x-user-role`.
pub struct Auth(pub Requester);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // First check if a layer already set the requester
        if let Some(requester) = parts.extensions.get::<Requester>().cloned() {
            return Ok(Auth(requester));
        }

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AuthError::MissingIdentity)?
            .to_str()
            .map_err(|_| AuthError::InvalidIdentity)?
            .trim();
        if user_id.is_empty() {
            return Err(AuthError::InvalidIdentity);
        }

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| AuthError::InvalidRole("<non-ascii>".to_string()))?;
                Role::from_str(raw).ok_or_else(|| AuthError::InvalidRole(raw.to_string()))?
            }
            None => Role::default(),
        };

        Ok(Auth(Requester::new(user_id, role)))
    }
}
