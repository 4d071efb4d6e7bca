use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderName, StatusCode};
use uuid::Uuid;

use crate::api::rest::error::from_parts;
use crate::api::rest::problem::ProblemResponse;
use crate::contract::Role;

pub fn user_id_header() -> HeaderName {
    HeaderName::from_static("x-user-id")
}

pub fn user_role_header() -> HeaderName {
    HeaderName::from_static("x-user-role")
}

/// The authenticated caller, as asserted by the fronting auth gateway.
///
/// Token verification and session handling live outside this service; by
/// the time a request reaches us the gateway has resolved the session and
/// injected `x-user-id` / `x-user-role`. We trust those headers as-is.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = |detail: &str| {
            from_parts(
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Unauthenticated",
                detail,
                parts.uri.path(),
            )
        };

        let user_id = parts
            .headers
            .get(user_id_header())
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| unauthorized("missing or malformed x-user-id header"))?;

        // absent role defaults to the ordinary user role
        let role = match parts.headers.get(user_role_header()) {
            None => Role::User,
            Some(v) => v
                .to_str()
                .ok()
                .and_then(Role::parse)
                .ok_or_else(|| unauthorized("malformed x-user-role header"))?,
        };

        Ok(Identity { user_id, role })
    }
}
