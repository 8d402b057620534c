use async_trait::async_trait;
use rating_portal::{
    ApiError,
    cache::{RatingCache, SnapshotRatingCache, SnapshotStore},
    models::{NewUser, NewVote, Role, User, UserWithRating, Vote},
    repository::Repository,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Mutex;

// --- Counting Repository ---

// Records every execution of the authoritative aggregate so the tests can
// observe whether the cache layer recomputed or served the snapshot.
struct CountingRepo {
    aggregate_calls: AtomicUsize,
    list: Vec<UserWithRating>,
}

impl CountingRepo {
    fn new(list: Vec<UserWithRating>) -> Self {
        Self {
            aggregate_calls: AtomicUsize::new(0),
            list,
        }
    }
}

#[async_trait]
impl Repository for CountingRepo {
    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.list.clone())
    }

    // Placeholders; the cache layer only ever runs the aggregate.
    async fn get_user(&self, _id: i64) -> Result<Option<User>, ApiError> {
        Ok(None)
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, ApiError> {
        Ok(None)
    }
    async fn create_user(&self, _draft: NewUser) -> Result<i64, ApiError> {
        Ok(1)
    }
    async fn update_user(
        &self,
        _id: i64,
        _first_name: Option<String>,
        _last_name: Option<String>,
        _email: Option<String>,
        _password_hash: Option<String>,
    ) -> Result<bool, ApiError> {
        Ok(false)
    }
    async fn delete_user(&self, _id: i64) -> Result<bool, ApiError> {
        Ok(false)
    }
    async fn get_role_by_access_level(&self, _level: i32) -> Result<Option<Role>, ApiError> {
        Ok(None)
    }
    async fn assign_role(&self, _user_id: i64, _role_id: i64) -> Result<(), ApiError> {
        Ok(())
    }
    async fn update_user_access_level(
        &self,
        _user_id: i64,
        _role_id: i64,
    ) -> Result<(), ApiError> {
        Ok(())
    }
    async fn get_role_for_user(&self, _user_id: i64) -> Result<Option<Role>, ApiError> {
        Ok(None)
    }
    async fn ensure_seed_roles(&self) -> Result<(), ApiError> {
        Ok(())
    }
    async fn get_vote(&self, _voter_id: i64, _profile_id: i64) -> Result<Option<Vote>, ApiError> {
        Ok(None)
    }
    async fn latest_vote_by(&self, _voter_id: i64) -> Result<Option<Vote>, ApiError> {
        Ok(None)
    }
    async fn insert_vote(&self, _vote: NewVote) -> Result<bool, ApiError> {
        Ok(true)
    }
    async fn update_vote_value(&self, _id: i64, _value: i32) -> Result<(), ApiError> {
        Ok(())
    }
    async fn delete_vote(&self, _voter_id: i64, _profile_id: i64) -> Result<bool, ApiError> {
        Ok(false)
    }
}

// --- In-Memory Snapshot Store ---

// Byte-level stand-in for Redis. Holds at most the single snapshot; the TTL
// is ignored since the tests never need expiry.
#[derive(Default)]
struct MemorySnapshotStore {
    snapshot: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    fn seeded(payload: Vec<u8>) -> Self {
        Self {
            snapshot: Mutex::new(Some(payload)),
        }
    }

    async fn stored(&self) -> Option<Vec<u8>> {
        self.snapshot.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read(&self) -> Result<Option<Vec<u8>>, ApiError> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn write(&self, payload: Vec<u8>, _ttl_seconds: u64) {
        *self.snapshot.lock().await = Some(payload);
    }
}

fn sample_list() -> Vec<UserWithRating> {
    vec![UserWithRating {
        id: 1,
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        email: "john@doe.com".to_string(),
        total_rating: 2,
    }]
}

// --- Tests ---

#[tokio::test]
async fn miss_rebuilds_and_the_snapshot_serves_repeat_reads() {
    let repo = Arc::new(CountingRepo::new(sample_list()));
    let store = Arc::new(MemorySnapshotStore::default());
    let cache = SnapshotRatingCache::new(store.clone(), repo.clone());

    let first = cache.rated_user_list().await.unwrap();
    assert_eq!(first, sample_list());
    assert_eq!(repo.aggregate_calls.load(Ordering::SeqCst), 1);
    assert!(store.stored().await.is_some(), "the miss must repopulate");

    // The second read within the TTL is a hit and never reaches the store.
    let second = cache.rated_user_list().await.unwrap();
    assert_eq!(second, sample_list());
    assert_eq!(repo.aggregate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_snapshot_is_rebuilt_from_the_aggregate() {
    let repo = Arc::new(CountingRepo::new(sample_list()));
    let store = Arc::new(MemorySnapshotStore::seeded(b"{not json".to_vec()));
    let cache = SnapshotRatingCache::new(store.clone(), repo.clone());

    // The undecodable payload counts as a miss, not an error.
    let users = cache.rated_user_list().await.unwrap();
    assert_eq!(users, sample_list());
    assert_eq!(repo.aggregate_calls.load(Ordering::SeqCst), 1);

    // The rebuild overwrote the corrupt bytes with a decodable snapshot.
    let stored = store.stored().await.unwrap();
    let decoded: Vec<UserWithRating> = serde_json::from_slice(&stored).unwrap();
    assert_eq!(decoded, sample_list());
}

// Port 1 on loopback is never listening, so every pool checkout fails and the
// cache must degrade to the direct aggregate query instead of failing the read.
#[tokio::test]
async fn unreachable_backend_degrades_to_the_store() {
    let repo = Arc::new(CountingRepo::new(sample_list()));
    let cache = SnapshotRatingCache::redis_from_url("redis://127.0.0.1:1", repo.clone()).unwrap();

    let users = cache.rated_user_list().await.unwrap();
    assert_eq!(users, sample_list());
    assert_eq!(repo.aggregate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn degraded_reads_hit_the_aggregate_every_time() {
    let repo = Arc::new(CountingRepo::new(sample_list()));
    let cache = SnapshotRatingCache::redis_from_url("redis://127.0.0.1:1", repo.clone()).unwrap();

    cache.rated_user_list().await.unwrap();
    cache.rated_user_list().await.unwrap();

    // Without a reachable backend there is no snapshot to serve, so each read
    // recomputes. Freshness bounding with a live backend is covered by the
    // 60-second SETEX expiry.
    assert_eq!(repo.aggregate_calls.load(Ordering::SeqCst), 2);
}
