use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::{CACHE_TTL_SECONDS, OPERATION_TIMEOUT},
    error::ApiError,
    models::UserWithRating,
    repository::RepositoryState,
};

/// The single fixed key holding the serialized rating snapshot. One global
/// list shared by every reader; no per-user partitioning.
const RATED_LIST_KEY: &str = "users:list";

/// RatingCache
///
/// Capability interface for the cached rated-user-list read. The concrete
/// implementation sits in front of the repository's aggregate query; tests
/// substitute canned implementations.
#[async_trait]
pub trait RatingCache: Send + Sync {
    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError>;
}

/// The concrete type used to share the cache layer across the application state.
pub type CacheState = Arc<dyn RatingCache>;

/// SnapshotStore
///
/// Byte-level access to the single stored rating snapshot. Keeping the raw
/// get/set behind this seam separates the backend from the cache-aside flow,
/// which runs identically over Redis or an in-memory stand-in.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the raw snapshot bytes, or None on a miss. Any backend or
    /// deadline failure is reported as an error so the caller can degrade.
    async fn read(&self) -> Result<Option<Vec<u8>>, ApiError>;

    /// Stores a fresh snapshot with the given expiry. Implementations log and
    /// drop failures; the caller already holds the authoritative result.
    async fn write(&self, payload: Vec<u8>, ttl_seconds: u64);
}

/// RedisSnapshotStore
///
/// Pooled Redis backend for the snapshot. Every call runs under the
/// per-operation deadline.
pub struct RedisSnapshotStore {
    pool: Pool,
    op_timeout: Duration,
}

impl RedisSnapshotStore {
    pub fn from_url(redis_url: &str) -> Result<Self, ApiError> {
        let config = Config::from_url(redis_url);
        let pool = config.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            tracing::error!("failed to create redis pool: {e}");
            ApiError::CacheUnavailable
        })?;

        Ok(Self {
            pool,
            op_timeout: OPERATION_TIMEOUT,
        })
    }
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn read(&self) -> Result<Option<Vec<u8>>, ApiError> {
        let mut conn = tokio::time::timeout(self.op_timeout, self.pool.get())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(|e| {
                tracing::warn!("failed to get redis connection: {e}");
                ApiError::CacheUnavailable
            })?;

        let value = tokio::time::timeout(
            self.op_timeout,
            conn.get::<_, Option<Vec<u8>>>(RATED_LIST_KEY),
        )
        .await
        .map_err(|_| ApiError::Timeout)?
        .map_err(|e| {
            tracing::warn!("redis GET failed for key `{RATED_LIST_KEY}`: {e}");
            ApiError::CacheUnavailable
        })?;

        Ok(value)
    }

    async fn write(&self, payload: Vec<u8>, ttl_seconds: u64) {
        let mut conn = match tokio::time::timeout(self.op_timeout, self.pool.get()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::warn!("failed to get redis connection: {e}");
                return;
            }
            Err(_) => {
                tracing::warn!("redis connection acquisition timed out");
                return;
            }
        };

        let set = conn.set_ex::<_, _, ()>(RATED_LIST_KEY, payload, ttl_seconds);
        match tokio::time::timeout(self.op_timeout, set).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("redis SETEX failed for key `{RATED_LIST_KEY}`: {e}"),
            Err(_) => tracing::warn!("redis SETEX timed out for key `{RATED_LIST_KEY}`"),
        }
    }
}

/// SnapshotRatingCache
///
/// Cache-aside layer over a snapshot store. A hit deserializes the stored
/// snapshot; a miss runs the authoritative aggregate, stores the result with
/// a 60-second expiry and returns it. There is no write-path invalidation: a
/// new vote does not bust the snapshot, so staleness is bounded only by the
/// TTL.
///
/// An unreachable or failing backend degrades to the direct aggregate query
/// instead of failing the read.
pub struct SnapshotRatingCache {
    store: Arc<dyn SnapshotStore>,
    repo: RepositoryState,
    ttl_seconds: u64,
}

impl SnapshotRatingCache {
    pub fn new(store: Arc<dyn SnapshotStore>, repo: RepositoryState) -> Self {
        Self {
            store,
            repo,
            ttl_seconds: CACHE_TTL_SECONDS,
        }
    }

    /// The production composition: a pooled Redis snapshot store.
    pub fn redis_from_url(redis_url: &str, repo: RepositoryState) -> Result<Self, ApiError> {
        let store = Arc::new(RedisSnapshotStore::from_url(redis_url)?);
        Ok(Self::new(store, repo))
    }
}

#[async_trait]
impl RatingCache for SnapshotRatingCache {
    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError> {
        match self.store.read().await {
            Ok(Some(bytes)) => {
                match serde_json::from_slice::<Vec<UserWithRating>>(&bytes) {
                    Ok(users) => return Ok(users),
                    Err(e) => {
                        // A corrupt snapshot counts as a miss and gets rebuilt.
                        tracing::warn!("discarding undecodable rating snapshot: {e}");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                // Degrade to the direct aggregate rather than failing the read.
                tracing::warn!("rating cache unavailable, falling back to store: {e}");
                return self.repo.rated_user_list().await;
            }
        }

        // Miss: rebuild from the authoritative aggregate and repopulate.
        let users = self.repo.rated_user_list().await?;

        match serde_json::to_vec(&users) {
            Ok(payload) => self.store.write(payload, self.ttl_seconds).await,
            Err(e) => tracing::warn!("failed to serialize rating snapshot: {e}"),
        }

        Ok(users)
    }
}
