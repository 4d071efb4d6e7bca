use axum::http::StatusCode;

use crate::api::rest::problem::{Problem, ProblemResponse};
use crate::domain::error::DomainError;

/// Helper to create a ProblemResponse with less boilerplate
pub fn from_parts(
    status: StatusCode,
    code: &str,
    title: &str,
    detail: impl Into<String>,
    instance: &str,
) -> ProblemResponse {
    let problem = Problem::new(status, title, detail)
        .with_type(format!("https://errors.bazaar.dev/{}", code))
        .with_code(code)
        .with_instance(instance);

    // Add request ID from current tracing span if available
    let problem = if let Some(id) = tracing::Span::current().id() {
        problem.with_request_id(id.into_u64().to_string())
    } else {
        problem
    };

    ProblemResponse(problem)
}

/// Map domain error to RFC 9457 ProblemResponse
pub fn map_domain_error(e: &DomainError, instance: &str) -> ProblemResponse {
    match e {
        DomainError::NotFound { .. } => from_parts(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Not found",
            format!("{}", e),
            instance,
        ),
        DomainError::Forbidden { .. } => from_parts(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Not authorized",
            format!("{}", e),
            instance,
        ),
        DomainError::InvalidState { .. } => from_parts(
            StatusCode::BAD_REQUEST,
            "INVALID_STATE",
            "Invalid state",
            format!("{}", e),
            instance,
        ),
        DomainError::OwnListing => from_parts(
            StatusCode::BAD_REQUEST,
            "OWN_LISTING",
            "Invalid operation",
            format!("{}", e),
            instance,
        ),
        DomainError::Conflict { .. } => from_parts(
            StatusCode::CONFLICT,
            "CONFLICT",
            "Conflict",
            format!("{}", e),
            instance,
        ),
        DomainError::Validation { .. } => from_parts(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "Validation error",
            format!("{}", e),
            instance,
        ),
        DomainError::Storage { .. } => {
            // Log the internal error details but don't expose them to the client
            tracing::error!(error = ?e, "Storage error occurred");
            from_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_STORAGE",
                "Internal error",
                "An internal storage error occurred",
                instance,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn maps_taxonomy_to_statuses() {
        let cases = [
            (DomainError::listing_not_found(Uuid::nil()), 404, "NOT_FOUND"),
            (DomainError::forbidden("nope"), 403, "FORBIDDEN"),
            (DomainError::invalid_state("late"), 400, "INVALID_STATE"),
            (DomainError::OwnListing, 400, "OWN_LISTING"),
            (DomainError::conflict("dup"), 409, "CONFLICT"),
            (DomainError::validation("price", "negative"), 400, "VALIDATION"),
            (DomainError::storage("boom"), 500, "INTERNAL_STORAGE"),
        ];
        for (err, status, code) in cases {
            let resp = map_domain_error(&err, "/api/offers");
            assert_eq!(resp.0.status, status, "{err}");
            assert_eq!(resp.0.code, code, "{err}");
            assert_eq!(resp.0.instance, "/api/offers");
        }
    }

    #[test]
    fn storage_detail_is_redacted() {
        let resp = map_domain_error(&DomainError::storage("password in dsn"), "/api/offers");
        assert!(!resp.0.detail.contains("password"));
    }
}
