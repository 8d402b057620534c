use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The typed error taxonomy shared by the access guard, the voting engine and the
/// repository layer. Every variant carries a stable client-facing message; the
/// handlers and extractors return these to the boundary, where `IntoResponse`
/// maps each variant onto its HTTP status.
///
/// Underlying store/cache failures are logged at the point they are mapped and
/// never leak driver detail to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The bearer token is missing, malformed, expired or carries a bad signature.
    #[error("invalid or expired token")]
    InvalidToken,
    /// The caller is authenticated but lacks the required access level.
    #[error("permission denied")]
    PermissionDenied,
    /// A token decoded cleanly but its subject no longer exists in the directory.
    #[error("user for this token no longer exists")]
    IdentityNotFound,
    /// The caller exists but has no active role assignment.
    #[error("no role assigned to this user")]
    RoleNotFound,
    /// A uniqueness constraint was violated (duplicate email, lost vote race).
    #[error("conflict with existing record")]
    Conflict,
    /// A request that can never succeed, regardless of state (e.g. self-vote).
    #[error("{0}")]
    InvalidOperation(String),
    /// The voter is still inside the cooldown window.
    #[error("you are not able to vote right now, please try again later")]
    RateLimited,
    /// The identical vote already exists for this (voter, profile) pair.
    #[error("you have already voted for this profile")]
    DuplicateVote,
    #[error("not found")]
    NotFound,
    /// Cache backend unreachable after the direct-store fallback also failed.
    #[error("cache backend unavailable")]
    CacheUnavailable,
    /// A store or cache call exceeded the per-operation deadline.
    #[error("operation timed out")]
    Timeout,
    /// Catch-all for backing-store failures. Not retried automatically.
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidToken | ApiError::IdentityNotFound => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied | ApiError::RoleNotFound => StatusCode::FORBIDDEN,
            ApiError::Conflict | ApiError::DuplicateVote => StatusCode::CONFLICT,
            ApiError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::CacheUnavailable => StatusCode::BAD_GATEWAY,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage(ref e) = self {
            // The client only ever sees the generic message.
            tracing::error!("storage error: {:?}", e);
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_covers_auth_failures() {
        assert_eq!(ApiError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::IdentityNotFound.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::PermissionDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::RoleNotFound.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn status_mapping_covers_vote_rejections() {
        assert_eq!(ApiError::DuplicateVote.status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::InvalidOperation("you can't vote for yourself".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn storage_error_message_is_generic() {
        let err = ApiError::Storage(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "storage error");
    }
}
