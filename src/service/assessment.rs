// src/service/assessment.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::{
    config::{Config, MAX_SESSION_TTL_SECS},
    error::AppError,
    models::{
        result::{AssessmentResult, RecordOutcome, ScoredSession, Solution},
        session::{AnswerSet, Session, SessionRecord},
        user::UserProfile,
    },
    service::scoring,
    store::AssessmentStore,
};

/// Authoritative side of a verification test: issues sessions, keeps the
/// answer key, scores submissions and writes verified-skill state.
pub struct AssessmentService {
    store: Arc<dyn AssessmentStore>,
    questions_per_session: usize,
    session_ttl: chrono::Duration,
}

impl AssessmentService {
    pub fn new(store: Arc<dyn AssessmentStore>, config: &Config) -> Self {
        Self {
            store,
            questions_per_session: config.questions_per_session,
            session_ttl: chrono::Duration::seconds(
                config.session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64,
            ),
        }
    }

    pub fn store(&self) -> &Arc<dyn AssessmentStore> {
        &self.store
    }

    pub async fn profile(&self, user_id: i64) -> Result<UserProfile, AppError> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))
    }

    /// Issues a new session for one of the caller's declared, unverified skills.
    pub async fn start_session(&self, user_id: i64, skill: &str) -> Result<Session, AppError> {
        let profile = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or(AppError::AuthError("Unknown user".to_string()))?;

        let skill = skill.trim();
        if !profile.skills.iter().any(|s| s == skill) {
            return Err(AppError::InvalidSkill(format!(
                "'{}' is not one of your declared skills",
                skill
            )));
        }
        if profile.is_verified(skill) {
            return Err(AppError::InvalidSkill(format!(
                "'{}' is already verified",
                skill
            )));
        }

        let questions = self
            .store
            .draw_questions(skill, self.questions_per_session)
            .await?;
        if questions.is_empty() {
            return Err(AppError::BadRequest(format!(
                "No questions available for '{}'",
                skill
            )));
        }

        let now = Utc::now();
        let record = SessionRecord {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            skill: skill.to_string(),
            questions,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.store.insert_session(&record).await?;

        tracing::info!(
            session_id = %record.session_id,
            user_id,
            skill = %record.skill,
            questions = record.questions.len(),
            "Verification session started"
        );

        Ok(record.to_public())
    }

    /// Scores a session. The first submission wins; later submissions for the
    /// same session return the stored score without re-applying any write.
    pub async fn submit_session(
        &self,
        user_id: i64,
        session_id: &str,
        answers: AnswerSet,
        include_solutions: bool,
    ) -> Result<AssessmentResult, AppError> {
        let session = self.owned_session(user_id, session_id).await?;

        let scored = match self.store.get_score(session_id).await? {
            Some(existing) => {
                tracing::info!(session_id, "Session already scored, returning stored result");
                existing
            }
            None => {
                if session.is_expired(Utc::now()) {
                    return Err(AppError::SessionExpired(
                        "Session expired before it was submitted".to_string(),
                    ));
                }

                let (correct, total) = scoring::calculate_score(&answers, &session.questions);
                let candidate = ScoredSession {
                    session_id: session.session_id.clone(),
                    user_id,
                    skill: session.skill.clone(),
                    correct,
                    total,
                    passed: scoring::is_passing(correct, total),
                    answers,
                    scored_at: Utc::now(),
                };

                match self.store.record_score(candidate).await? {
                    RecordOutcome::Recorded(s) => {
                        tracing::info!(
                            session_id,
                            user_id,
                            skill = %s.skill,
                            correct = s.correct,
                            total = s.total,
                            passed = s.passed,
                            "Session scored"
                        );
                        if s.passed {
                            tracing::info!(user_id, skill = %s.skill, "Skill verified");
                        }
                        s
                    }
                    RecordOutcome::AlreadyScored(s) => {
                        tracing::warn!(session_id, "Concurrent submission lost the race");
                        s
                    }
                }
            }
        };

        let mut result = scoring::build_result(scored.correct, scored.total);
        if include_solutions {
            result.solutions = Some(scoring::solutions(&session.questions, &scored.answers));
        }
        Ok(result)
    }

    /// Answer key paired with the submitted answers; only after scoring.
    pub async fn reveal_solutions(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<Vec<Solution>, AppError> {
        let session = self.owned_session(user_id, session_id).await?;

        let scored = self
            .store
            .get_score(session_id)
            .await?
            .ok_or(AppError::Conflict(
                "Solutions are available only after the session is submitted".to_string(),
            ))?;

        Ok(scoring::solutions(&session.questions, &scored.answers))
    }

    /// Deletes abandoned sessions whose lease ran out.
    pub async fn reap_expired(&self) -> Result<u64, AppError> {
        let purged = self.store.purge_expired_sessions(Utc::now()).await?;
        if purged > 0 {
            tracing::info!(purged, "Reaped expired verification sessions");
        }
        Ok(purged)
    }

    /// Runs [`reap_expired`](Self::reap_expired) on a fixed period until aborted.
    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = service.reap_expired().await {
                    tracing::warn!("Session reaper sweep failed: {}", e);
                }
            }
        })
    }

    // Sessions belonging to someone else look exactly like unknown ones.
    async fn owned_session(
        &self,
        user_id: i64,
        session_id: &str,
    ) -> Result<SessionRecord, AppError> {
        match self.store.get_session(session_id).await? {
            Some(s) if s.user_id == user_id => Ok(s),
            _ => Err(AppError::UnknownSession("Session not found".to_string())),
        }
    }
}
