use crate::{
    AppState,
    auth::{self, ACCESS_LEVEL_ADMIN, AuthUser},
    error::ApiError,
    models::{
        EditUserRequest, LoginRequest, LoginResponse, NewUser, RegisterRequest, UserWithRating,
        VoteRequest, VoteResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

// --- Public Handlers ---

/// register_user
///
/// [Public Route] Creates a user plus their role assignment. The password is
/// bcrypt-hashed before it reaches the repository; the requested access level
/// must name one of the seeded roles. Responds with the new user id.
#[utoipa::path(
    post,
    path = "/user/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered, returns the new user id", body = i64),
        (status = 400, description = "Undefined access level"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<i64>, ApiError> {
    let role = state
        .repo
        .get_role_by_access_level(payload.access_level)
        .await?
        .ok_or_else(|| ApiError::InvalidOperation("undefined access level".to_string()))?;

    let password_hash = auth::hash_password(&payload.password)?;

    // A duplicate email surfaces as Conflict from the uniqueness constraint.
    let user_id = state
        .repo
        .create_user(NewUser {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            password_hash,
        })
        .await?;

    state.repo.assign_role(user_id, role.id).await?;

    Ok(Json(user_id))
}

/// login_user
///
/// [Public Route] Verifies credentials and issues a signed bearer token.
/// An unknown email and a wrong password produce the same message, so the
/// response never reveals which half failed.
#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = || ApiError::InvalidOperation("invalid email or password".to_string());

    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = auth::issue_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_seconds)?;

    Ok(Json(LoginResponse { token }))
}

// --- Guarded Handlers ---

/// get_user_list
///
/// [Admin Route] The rated user list, read through the cache-aside layer.
/// Every reader observes the same snapshot; staleness is bounded by the
/// 60-second cache TTL.
#[utoipa::path(
    get,
    path = "/user/getlist",
    responses(
        (status = 200, description = "Users with summed ratings", body = [UserWithRating]),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn get_user_list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserWithRating>>, ApiError> {
    auth.require_access_level(ACCESS_LEVEL_ADMIN)?;

    let users = state.cache.rated_user_list().await?;
    Ok(Json(users))
}

/// Empty strings in the edit payload count as absent, so a client sending
/// `""` never blanks a stored value.
fn filled(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// edit_user
///
/// [Admin Route] Partial profile update plus role reassignment. Only non-empty
/// provided fields overwrite; a provided password is re-hashed, and a provided
/// access level rewrites the user's single active role assignment.
#[utoipa::path(
    post,
    path = "/user/edit/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = EditUserRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn edit_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<EditUserRequest>,
) -> Result<StatusCode, ApiError> {
    auth.require_access_level(ACCESS_LEVEL_ADMIN)?;

    let password_hash = match payload.password.as_deref() {
        Some(password) if !password.is_empty() => Some(auth::hash_password(password)?),
        _ => None,
    };

    let updated = state
        .repo
        .update_user(
            id,
            filled(payload.first_name),
            filled(payload.last_name),
            filled(payload.email),
            password_hash,
        )
        .await?;

    if !updated {
        return Err(ApiError::NotFound);
    }

    if let Some(level) = payload.access_level {
        let role = state
            .repo
            .get_role_by_access_level(level)
            .await?
            .ok_or_else(|| ApiError::InvalidOperation("undefined access level".to_string()))?;
        state.repo.update_user_access_level(id, role.id).await?;
    }

    Ok(StatusCode::OK)
}

/// delete_user
///
/// [Admin Route] Removes a user permanently. Hard delete, no tombstones.
#[utoipa::path(
    post,
    path = "/user/delete/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require_access_level(ACCESS_LEVEL_ADMIN)?;

    if state.repo.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// cast_vote
///
/// [Admin Route] Runs the voting engine as the token's caller. The voter is
/// always the authenticated identity, never taken from the body. Success
/// echoes only the caller id.
#[utoipa::path(
    post,
    path = "/user/vote",
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote accepted", body = VoteResponse),
        (status = 400, description = "Self-vote"),
        (status = 409, description = "Duplicate vote"),
        (status = 429, description = "Within the cooldown window")
    )
)]
pub async fn cast_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    auth.require_access_level(ACCESS_LEVEL_ADMIN)?;

    state
        .engine
        .cast(auth.id, payload.profile_id, payload.value, Utc::now())
        .await?;

    Ok(Json(VoteResponse { voter_id: auth.id }))
}
