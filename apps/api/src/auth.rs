//! Caller identity. Authentication happens upstream; the gateway forwards the
//! verified uid and role in headers and this extractor only reads them.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;
use crate::models::user::{Caller, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .ok_or(AppError::Unauthorized)?;

        // Missing role means a plain user; an unrecognised one is refused outright.
        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::User,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|r| r.parse::<Role>().ok())
                .ok_or(AppError::Forbidden)?,
        };

        Ok(Caller {
            uid: uid.to_string(),
            role,
        })
    }
}
