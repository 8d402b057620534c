use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::{
    config::{OPERATION_TIMEOUT, VOTE_COOLDOWN},
    error::ApiError,
    models::NewVote,
    repository::RepositoryState,
};

/// VoteOutcome
///
/// The successful transitions of the per-(voter, profile) state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote for this pair; a new row was inserted.
    Created,
    /// An existing vote's value was changed in place.
    Updated,
    /// The existing vote was removed (value 0 request).
    Withdrawn,
}

/// VotingEngine
///
/// Decides the outcome of a vote request given the voter's history and the
/// per-voter cooldown. Stateless beyond its injected repository; all
/// coordination is delegated to the store's constraints (the unique
/// (voter_id, profile_id) pair backs the first-vote insert).
pub struct VotingEngine {
    repo: RepositoryState,
    cooldown: ChronoDuration,
    op_timeout: Duration,
}

impl VotingEngine {
    pub fn new(repo: RepositoryState) -> Self {
        Self {
            repo,
            cooldown: ChronoDuration::from_std(VOTE_COOLDOWN)
                .unwrap_or_else(|_| ChronoDuration::hours(1)),
            op_timeout: OPERATION_TIMEOUT,
        }
    }

    /// cast
    ///
    /// Runs the transition rules for an incoming vote request, in order:
    ///
    /// 1. Self-vote guard: `voter_id == profile_id` is rejected outright.
    /// 2. Cooldown guard: the voter's single most recent vote across *all*
    ///    profiles gates new actions; within the window the request is
    ///    rejected with `RateLimited`. Intentionally global per voter.
    /// 3. Existing-vote lookup for this specific pair:
    ///    - none: insert with timestamp `now` -> `Created`. A concurrent
    ///      insert that wins the pair's unique constraint maps to `Conflict`.
    ///    - some, incoming value 0: withdrawal is an exclusive terminal
    ///      transition; the row is deleted and no further checks run.
    ///    - some, equal value: `DuplicateVote`, nothing mutated.
    ///    - some, different value: the row's value is updated in place.
    ///
    /// The whole sequence runs under the per-operation deadline; expiry
    /// surfaces as `Timeout`.
    pub async fn cast(
        &self,
        voter_id: i64,
        profile_id: i64,
        value: i32,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, ApiError> {
        tokio::time::timeout(self.op_timeout, self.decide(voter_id, profile_id, value, now))
            .await
            .map_err(|_| ApiError::Timeout)?
    }

    async fn decide(
        &self,
        voter_id: i64,
        profile_id: i64,
        value: i32,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, ApiError> {
        if voter_id == profile_id {
            return Err(ApiError::InvalidOperation(
                "you can't vote for yourself".to_string(),
            ));
        }

        // Only the most recent vote matters, regardless of its target.
        if let Some(last) = self.repo.latest_vote_by(voter_id).await? {
            if now - last.voted_at <= self.cooldown {
                return Err(ApiError::RateLimited);
            }
        }

        let existing = self.repo.get_vote(voter_id, profile_id).await?;

        match existing {
            None => {
                let inserted = self
                    .repo
                    .insert_vote(NewVote {
                        voter_id,
                        profile_id,
                        value,
                        voted_at: now,
                    })
                    .await?;

                // A concurrent request for the same pair got there first.
                if inserted {
                    Ok(VoteOutcome::Created)
                } else {
                    Err(ApiError::Conflict)
                }
            }
            Some(vote) => {
                // Withdrawal short-circuits the duplicate/update checks; it
                // never falls through to an update against the deleted row.
                if value == 0 {
                    self.repo.delete_vote(voter_id, profile_id).await?;
                    return Ok(VoteOutcome::Withdrawn);
                }

                if vote.value == value {
                    return Err(ApiError::DuplicateVote);
                }

                self.repo.update_vote_value(vote.id, value).await?;
                Ok(VoteOutcome::Updated)
            }
        }
    }
}
