use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::Role,
    repository::RepositoryState,
};

/// The access level required for the operational endpoints. Lower value means
/// more privilege in this model: Admin = 1, Moderator = 2, User = 3.
pub const ACCESS_LEVEL_ADMIN: i32 = 1;

/// Claims
///
/// Payload structure carried inside the signed bearer token. Signed with the
/// process-wide shared secret (HS256) and validated on every guarded request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the numeric id of the user.
    pub sub: i64,
    /// Expiration time. Tokens past this timestamp are rejected.
    pub exp: usize,
    /// Issued-at timestamp.
    pub iat: usize,
}

/// issue_token
///
/// Signs a bearer token embedding the user id and an absolute expiry
/// `ttl_seconds` from now. HS256 gives a constant-time-verifiable signature
/// against the shared secret.
pub fn issue_token(user_id: i64, secret: &str, ttl_seconds: i64) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + ttl_seconds) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ApiError::InvalidToken)
}

/// hash_password
///
/// One-way bcrypt hash applied before a password ever reaches the repository.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|_| ApiError::InvalidOperation("failed to hash password".to_string()))
}

/// verify_password
///
/// Checks a plaintext candidate against a stored bcrypt hash. Any bcrypt error
/// counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the output of the access
/// guard. Handlers receive the user id for downstream use (e.g. the voting
/// engine's caller) and the current role for privilege checks.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl AuthUser {
    /// require_access_level
    ///
    /// Enforces the privilege floor for an operation. Lower numeric level is
    /// more privileged, so the caller passes when their level is at or below
    /// the required one.
    pub fn require_access_level(&self, required: i32) -> Result<(), ApiError> {
        if self.role.access_level <= required {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any guarded handler and keeping authentication apart
/// from business logic.
///
/// The process:
/// 1. Dependency resolution: Repository and AppConfig from the application state.
/// 2. Local bypass: development-time access via the 'x-user-id' header.
/// 3. Token validation: Bearer extraction and JWT decoding.
/// 4. Directory lookup: the user must still exist and carry a role assignment.
///
/// Rejections are typed `ApiError` values mapped to statuses at the boundary:
/// `InvalidToken` (401) for token problems, `IdentityNotFound` (401) when the
/// subject was deleted after issuance, `RoleNotFound` (403) when no role
/// assignment exists.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // Local development bypass: a known user id in 'x-user-id' authenticates
        // the request, guarded by the Env check so it can never fire in
        // production. The id must still map to a real user and role.
        if config.env == Env::Local {
            if let Some(user_id_header) = parts.headers.get("x-user-id") {
                if let Ok(id_str) = user_id_header.to_str() {
                    if let Ok(user_id) = id_str.parse::<i64>() {
                        if let Some(user) = repo.get_user(user_id).await? {
                            let role = repo
                                .get_role_for_user(user.id)
                                .await?
                                .ok_or(ApiError::RoleNotFound)?;
                            return Ok(AuthUser { id: user.id, role });
                        }
                    }
                }
            }
        }
        // Production, or a failed bypass, falls through to JWT validation.

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidToken)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;

        // Expiry, bad signature and malformed structure all collapse onto the
        // same client-visible InvalidToken.
        let token_data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|_| ApiError::InvalidToken)?;

        let user_id = token_data.claims.sub;

        // The token may be valid while the user was deleted after issuance.
        let user = repo
            .get_user(user_id)
            .await?
            .ok_or(ApiError::IdentityNotFound)?;

        let role = repo
            .get_role_for_user(user.id)
            .await?
            .ok_or(ApiError::RoleNotFound)?;

        Ok(AuthUser { id: user.id, role })
    }
}
