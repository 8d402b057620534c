use async_trait::async_trait;
use rating_portal::{
    ApiError,
    models::{NewUser, NewVote, Role, User, UserWithRating, Vote},
    repository::{DeadlineRepository, Repository},
};
use std::sync::Arc;
use std::time::Duration;

// --- Stalling Repository ---

// Every call hangs far past the per-operation deadline, standing in for a
// wedged database connection. The tests run with paused tokio time, so the
// deadline fires immediately instead of after wall-clock seconds.
struct StallingRepo;

impl StallingRepo {
    async fn stall(&self) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

#[async_trait]
impl Repository for StallingRepo {
    async fn get_user(&self, _id: i64) -> Result<Option<User>, ApiError> {
        self.stall().await;
        Ok(None)
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, ApiError> {
        self.stall().await;
        Ok(None)
    }
    async fn create_user(&self, _draft: NewUser) -> Result<i64, ApiError> {
        self.stall().await;
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
        self.stall().await;
        Ok(false)
    }
    async fn delete_user(&self, _id: i64) -> Result<bool, ApiError> {
        self.stall().await;
        Ok(false)
    }
    async fn get_role_by_access_level(&self, _level: i32) -> Result<Option<Role>, ApiError> {
        self.stall().await;
        Ok(None)
    }
    async fn assign_role(&self, _user_id: i64, _role_id: i64) -> Result<(), ApiError> {
        self.stall().await;
        Ok(())
    }
    async fn update_user_access_level(
        &self,
        _user_id: i64,
        _role_id: i64,
    ) -> Result<(), ApiError> {
        self.stall().await;
        Ok(())
    }
    async fn get_role_for_user(&self, _user_id: i64) -> Result<Option<Role>, ApiError> {
        self.stall().await;
        Ok(None)
    }
    async fn ensure_seed_roles(&self) -> Result<(), ApiError> {
        self.stall().await;
        Ok(())
    }
    async fn get_vote(&self, _voter_id: i64, _profile_id: i64) -> Result<Option<Vote>, ApiError> {
        self.stall().await;
        Ok(None)
    }
    async fn latest_vote_by(&self, _voter_id: i64) -> Result<Option<Vote>, ApiError> {
        self.stall().await;
        Ok(None)
    }
    async fn insert_vote(&self, _vote: NewVote) -> Result<bool, ApiError> {
        self.stall().await;
        Ok(true)
    }
    async fn update_vote_value(&self, _id: i64, _value: i32) -> Result<(), ApiError> {
        self.stall().await;
        Ok(())
    }
    async fn delete_vote(&self, _voter_id: i64, _profile_id: i64) -> Result<bool, ApiError> {
        self.stall().await;
        Ok(false)
    }
    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError> {
        self.stall().await;
        Ok(vec![])
    }
}

// Instant stand-in, to show the decorator is transparent for healthy calls.
struct PromptRepo;

#[async_trait]
impl Repository for PromptRepo {
    async fn get_user(&self, id: i64) -> Result<Option<User>, ApiError> {
        Ok(Some(User {
            id,
            ..Default::default()
        }))
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
        Ok(true)
    }
    async fn delete_user(&self, _id: i64) -> Result<bool, ApiError> {
        Ok(true)
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
        Ok(true)
    }
    async fn rated_user_list(&self) -> Result<Vec<UserWithRating>, ApiError> {
        Ok(vec![])
    }
}

// --- Tests ---

#[tokio::test(start_paused = true)]
async fn wedged_lookup_surfaces_timeout() {
    let repo = DeadlineRepository::new(Arc::new(StallingRepo));

    let result = repo.get_user(1).await;
    assert!(matches!(result, Err(ApiError::Timeout)));
}

#[tokio::test(start_paused = true)]
async fn wedged_aggregate_surfaces_timeout() {
    // The rated-list aggregate is the query the cache falls back to; it must
    // be bounded like every other store call.
    let repo = DeadlineRepository::new(Arc::new(StallingRepo));

    let result = repo.rated_user_list().await;
    assert!(matches!(result, Err(ApiError::Timeout)));
}

#[tokio::test(start_paused = true)]
async fn wedged_write_surfaces_timeout() {
    let repo = DeadlineRepository::new(Arc::new(StallingRepo));

    let result = repo
        .update_user(1, Some("Jane".into()), None, None, None)
        .await;
    assert!(matches!(result, Err(ApiError::Timeout)));
}

#[tokio::test(start_paused = true)]
async fn prompt_calls_pass_through_unchanged() {
    let repo = DeadlineRepository::new(Arc::new(PromptRepo));

    let user = repo.get_user(7).await.unwrap().unwrap();
    assert_eq!(user.id, 7);
    assert!(repo.delete_user(7).await.unwrap());
}
