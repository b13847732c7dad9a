// src/store/mod.rs

//! Persistence for users, the question bank, sessions and scores.
//!
//! Two backends implement [`AssessmentStore`]: Postgres for deployments and an
//! in-process store used when no `DATABASE_URL` is configured (and in tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        question::{NewQuestion, Question},
        result::{RecordOutcome, ScoredSession},
        session::SessionRecord,
        user::{NewUser, User, UserProfile},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    /// Inserts a user. Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError>;

    /// Replaces the declared skill list. Returns `false` for an unknown user.
    async fn set_skills(&self, user_id: i64, skills: &[String]) -> Result<bool, AppError>;

    async fn add_question(&self, question: NewQuestion) -> Result<Question, AppError>;

    /// Draws up to `limit` distinct bank questions for `skill`
    /// (skill names compare case-insensitively).
    async fn draw_questions(&self, skill: &str, limit: usize) -> Result<Vec<Question>, AppError>;

    async fn insert_session(&self, session: &SessionRecord) -> Result<(), AppError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError>;

    async fn get_score(&self, session_id: &str) -> Result<Option<ScoredSession>, AppError>;

    /// Stores `scored` unless a score already exists for its session.
    ///
    /// Runs as one atomic step: when the score is stored and passing, the
    /// skill is added to the user's verified set in the same step. A losing
    /// concurrent caller gets `AlreadyScored` with the winner's score.
    async fn record_score(&self, scored: ScoredSession) -> Result<RecordOutcome, AppError>;

    /// Adds `skill` to the verified set. Returns `false` if it was already there.
    async fn verify_skill(
        &self,
        user_id: i64,
        skill: &str,
        verified_by: Option<i64>,
    ) -> Result<bool, AppError>;

    /// Removes `skill` from the verified set. Returns `false` if it was absent.
    async fn unverify_skill(&self, user_id: i64, skill: &str) -> Result<bool, AppError>;

    /// Deletes unscored sessions whose lease ended before `now`.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
