use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical identity record stored in the `users` table. The numeric id is
/// immutable after creation; the email carries a uniqueness constraint enforced
/// by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// One-way bcrypt hash. Never serialized into responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Role
///
/// A named privilege tier from the `roles` table. Lower `access_level` means
/// more privilege: Admin = 1, Moderator = 2, User = 3. The set is seeded once
/// at bootstrap and treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: i64,
    pub label: String,
    pub access_level: i32,
}

/// Vote
///
/// A voter -> profile rating row from the `votes` table. At most one active row
/// exists per (voter_id, profile_id) pair, backed by a unique constraint.
/// A value of zero is never stored against an existing vote; it signals a
/// withdrawal and deletes the row instead.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Vote {
    pub id: i64,
    pub voter_id: i64,
    pub profile_id: i64,
    pub value: i32,
    #[ts(type = "string")]
    pub voted_at: DateTime<Utc>,
}

/// UserWithRating
///
/// Derived row for the rated user list: the user annotated with the sum of all
/// vote values where they are the profile. Zero-vote users appear with a
/// rating of 0 (LEFT JOIN in the aggregate query). This is also the shape
/// serialized into the Redis snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserWithRating {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub total_rating: i64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input for POST /user/register. The access level selects which seeded role
/// the new user is assigned; the password is hashed before it ever reaches the
/// repository.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub access_level: i32,
}

/// LoginRequest
///
/// Input for POST /user/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginResponse
///
/// Carries the signed bearer token on successful login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
}

/// EditUserRequest
///
/// Partial update payload for POST /user/edit/{id}. Only provided fields
/// overwrite; the password is re-hashed only when present, and the access
/// level rewrites the single active role assignment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EditUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<i32>,
}

/// VoteRequest
///
/// Input for POST /user/vote. The voter is never taken from the body; it is the
/// identity resolved from the bearer token. A value of 0 requests withdrawal of
/// the existing vote.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VoteRequest {
    pub profile_id: i64,
    pub value: i32,
}

/// VoteResponse
///
/// Echoes the caller identifier on success. No vote content is echoed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct VoteResponse {
    pub voter_id: i64,
}

// --- Internal Write Models ---

/// NewUser
///
/// Repository-facing draft for user creation, past the point where the
/// password has been hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// NewVote
///
/// Repository-facing draft for a first-time vote insert.
#[derive(Debug, Clone, Default)]
pub struct NewVote {
    pub voter_id: i64,
    pub profile_id: i64,
    pub value: i32,
    pub voted_at: DateTime<Utc>,
}
