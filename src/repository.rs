use crate::config::OPERATION_TIMEOUT;
use crate::error::ApiError;
use crate::models::{NewUser, NewVote, Role, User, UserWithRating, Vote};
use async_trait::async_trait;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Repository
///
/// Abstract contract for all persistence operations consumed by the access
/// guard, the voting engine and the handlers. Keeping the handlers against
/// this trait lets tests substitute in-memory mocks for PostgreSQL.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) shareable across Axum's task boundaries.
///
/// All methods surface backing-store failures as `ApiError::Storage`; nothing
/// is swallowed at this layer.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- User Directory ---
    async fn get_user(&self, id: i64) -> Result<Option<User>, ApiError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    /// Creates a user and returns the new id. A duplicate email maps to
    /// `ApiError::Conflict` via the storage layer's uniqueness constraint.
    async fn create_user(&self, draft: NewUser) -> Result<i64, ApiError>;
    /// Partial update: only provided fields overwrite (COALESCE semantics).
    /// Returns false when no such user exists.
    async fn update_user(
        &self,
        id: i64,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> Result<bool, ApiError>;
    /// Hard delete. Returns false when no such user exists.
    async fn delete_user(&self, id: i64) -> Result<bool, ApiError>;

    // --- Roles ---
    async fn get_role_by_access_level(&self, level: i32) -> Result<Option<Role>, ApiError>;
    /// Upserts the single active assignment for the user (latest write wins).
    async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ApiError>;
    /// Rewrites an existing assignment to a new role.
    async fn update_user_access_level(&self, user_id: i64, role_id: i64)
    -> Result<(), ApiError>;
    async fn get_role_for_user(&self, user_id: i64) -> Result<Option<Role>, ApiError>;
    /// Idempotent bootstrap seeding of the fixed role set.
    async fn ensure_seed_roles(&self) -> Result<(), ApiError>;

    // --- Votes ---
    async fn get_vote(&self, voter_id: i64, profile_id: i64) -> Result<Option<Vote>, ApiError>;
    /// The voter's most recent vote across all profiles. This single row gates
    /// the cooldown check.
    async fn latest_vote_by(&self, voter_id: i64) -> Result<Option<Vote>, ApiError>;
    /// Atomic first-vote insert. Relies on the unique (voter_id, profile_id)
    /// constraint: returns false when a concurrent insert won the race.
    async fn insert_vote(&self, vote: NewVote) -> Result<bool, ApiError>;
    /// Updates the value of an existing vote in place (id preserved).
    async fn update_vote_value(&self, id: i64, value: i32) -> Result<(), ApiError>;
    /// Removes the pair's vote. Returns false when no row existed.
    async fn delete_vote(&self, voter_id: i64, profile_id: i64) -> Result<bool, ApiError>;

    // --- Aggregates ---
    /// The authoritative rated-user aggregate behind the cache: every user with
    /// their summed vote value, zero-vote users included with rating 0.
    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError>;
}

/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// DeadlineRepository
///
/// Decorator applying the per-operation deadline to every call of the wrapped
/// store. Installed around the Postgres implementation at startup, it bounds
/// all repository access uniformly, whether the call comes from a handler,
/// the voting engine or the cache fallback. Expiry surfaces as
/// `ApiError::Timeout`.
pub struct DeadlineRepository {
    inner: RepositoryState,
    op_timeout: Duration,
}

impl DeadlineRepository {
    pub fn new(inner: RepositoryState) -> Self {
        Self {
            inner,
            op_timeout: OPERATION_TIMEOUT,
        }
    }

    async fn bound<T>(
        &self,
        fut: impl Future<Output = Result<T, ApiError>> + Send,
    ) -> Result<T, ApiError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| ApiError::Timeout)?
    }
}

#[async_trait]
impl Repository for DeadlineRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>, ApiError> {
        self.bound(self.inner.get_user(id)).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        self.bound(self.inner.get_user_by_email(email)).await
    }

    async fn create_user(&self, draft: NewUser) -> Result<i64, ApiError> {
        self.bound(self.inner.create_user(draft)).await
    }

    async fn update_user(
        &self,
        id: i64,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> Result<bool, ApiError> {
        self.bound(
            self.inner
                .update_user(id, first_name, last_name, email, password_hash),
        )
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<bool, ApiError> {
        self.bound(self.inner.delete_user(id)).await
    }

    async fn get_role_by_access_level(&self, level: i32) -> Result<Option<Role>, ApiError> {
        self.bound(self.inner.get_role_by_access_level(level)).await
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ApiError> {
        self.bound(self.inner.assign_role(user_id, role_id)).await
    }

    async fn update_user_access_level(
        &self,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), ApiError> {
        self.bound(self.inner.update_user_access_level(user_id, role_id))
            .await
    }

    async fn get_role_for_user(&self, user_id: i64) -> Result<Option<Role>, ApiError> {
        self.bound(self.inner.get_role_for_user(user_id)).await
    }

    async fn ensure_seed_roles(&self) -> Result<(), ApiError> {
        self.bound(self.inner.ensure_seed_roles()).await
    }

    async fn get_vote(&self, voter_id: i64, profile_id: i64) -> Result<Option<Vote>, ApiError> {
        self.bound(self.inner.get_vote(voter_id, profile_id)).await
    }

    async fn latest_vote_by(&self, voter_id: i64) -> Result<Option<Vote>, ApiError> {
        self.bound(self.inner.latest_vote_by(voter_id)).await
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<bool, ApiError> {
        self.bound(self.inner.insert_vote(vote)).await
    }

    async fn update_vote_value(&self, id: i64, value: i32) -> Result<(), ApiError> {
        self.bound(self.inner.update_vote_value(id, value)).await
    }

    async fn delete_vote(&self, voter_id: i64, profile_id: i64) -> Result<bool, ApiError> {
        self.bound(self.inner.delete_vote(voter_id, profile_id)).await
    }

    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError> {
        self.bound(self.inner.rated_user_list()).await
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique-constraint violation onto `ApiError::Conflict` and everything
/// else onto the storage catch-all.
fn map_insert_error(e: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return ApiError::Conflict;
        }
    }
    ApiError::Storage(e)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, email, password_hash, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, email, password_hash, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, draft: NewUser) -> Result<i64, ApiError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (first_name, last_name, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING id",
        )
        .bind(draft.first_name)
        .bind(draft.last_name)
        .bind(draft.email)
        .bind(draft.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;
        Ok(id)
    }

    async fn update_user(
        &self,
        id: i64,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        password_hash: Option<String>,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE users \
             SET first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 email = COALESCE($4, email), \
                 password_hash = COALESCE($5, password_hash) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_role_by_access_level(&self, level: i32) -> Result<Option<Role>, ApiError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, label, access_level FROM roles WHERE access_level = $1",
        )
        .bind(level)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), ApiError> {
        // One active assignment per user; a re-register or role edit replaces it.
        sqlx::query(
            "INSERT INTO role_assignments (user_id, role_id) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET role_id = EXCLUDED.role_id",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user_access_level(
        &self,
        user_id: i64,
        role_id: i64,
    ) -> Result<(), ApiError> {
        sqlx::query("UPDATE role_assignments SET role_id = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_role_for_user(&self, user_id: i64) -> Result<Option<Role>, ApiError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT r.id, r.label, r.access_level \
             FROM role_assignments a \
             JOIN roles r ON r.id = a.role_id \
             WHERE a.user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn ensure_seed_roles(&self) -> Result<(), ApiError> {
        // Fixed seed set: Admin=1, Moderator=2, User=3. Safe to run on every boot.
        sqlx::query(
            "INSERT INTO roles (label, access_level) \
             VALUES ('Admin', 1), ('Moderator', 2), ('User', 3) \
             ON CONFLICT (access_level) DO NOTHING",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_vote(&self, voter_id: i64, profile_id: i64) -> Result<Option<Vote>, ApiError> {
        let vote = sqlx::query_as::<_, Vote>(
            "SELECT id, voter_id, profile_id, value, voted_at \
             FROM votes WHERE voter_id = $1 AND profile_id = $2",
        )
        .bind(voter_id)
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn latest_vote_by(&self, voter_id: i64) -> Result<Option<Vote>, ApiError> {
        let vote = sqlx::query_as::<_, Vote>(
            "SELECT id, voter_id, profile_id, value, voted_at \
             FROM votes WHERE voter_id = $1 \
             ORDER BY voted_at DESC LIMIT 1",
        )
        .bind(voter_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<bool, ApiError> {
        // ON CONFLICT DO NOTHING makes the read-check-insert sequence in the
        // voting engine safe against a concurrent first vote for the same pair.
        let result = sqlx::query(
            "INSERT INTO votes (voter_id, profile_id, value, voted_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (voter_id, profile_id) DO NOTHING",
        )
        .bind(vote.voter_id)
        .bind(vote.profile_id)
        .bind(vote.value)
        .bind(vote.voted_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_vote_value(&self, id: i64, value: i32) -> Result<(), ApiError> {
        sqlx::query("UPDATE votes SET value = $2 WHERE id = $1")
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_vote(&self, voter_id: i64, profile_id: i64) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM votes WHERE voter_id = $1 AND profile_id = $2")
            .bind(voter_id)
            .bind(profile_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError> {
        let users = sqlx::query_as::<_, UserWithRating>(
            "SELECT u.id, u.first_name, u.last_name, u.email, \
                    COALESCE(SUM(v.value), 0)::BIGINT AS total_rating \
             FROM users u \
             LEFT JOIN votes v ON u.id = v.profile_id \
             GROUP BY u.id \
             ORDER BY u.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
