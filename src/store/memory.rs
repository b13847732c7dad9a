// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        question::{NewQuestion, Question},
        result::{RecordOutcome, ScoredSession},
        session::SessionRecord,
        user::{NewUser, User, UserProfile},
    },
    store::AssessmentStore,
};

#[derive(Debug, Clone)]
struct VerifiedEntry {
    verified_by: Option<i64>,
    session_id: Option<String>,
    verified_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_question_id: i64,
    users: BTreeMap<i64, User>,
    verified: HashMap<i64, BTreeMap<String, VerifiedEntry>>,
    questions: Vec<Question>,
    sessions: HashMap<String, SessionRecord>,
    scores: HashMap<String, ScoredSession>,
}

impl Inner {
    fn profile(&self, user: &User) -> UserProfile {
        let verified_skills = self
            .verified
            .get(&user.id)
            .map(|m| m.keys().map(|k| (k.clone(), true)).collect())
            .unwrap_or_default();

        UserProfile {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            skills: user.skills.clone(),
            verified_skills,
        }
    }

    fn insert_verified(&mut self, user_id: i64, skill: &str, entry: VerifiedEntry) -> bool {
        let set = self.verified.entry(user_id).or_default();
        if set.contains_key(skill) {
            return false;
        }
        set.insert(skill.to_string(), entry);
        true
    }
}

/// In-process store. One lock guards every map, so each trait call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open or scored sessions currently held.
    pub async fn session_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Which session (if any) produced a verified entry.
    pub async fn verified_source(&self, user_id: i64, skill: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        inner
            .verified
            .get(&user_id)
            .and_then(|m| m.get(skill))
            .and_then(|e| e.session_id.clone())
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.inner.lock().await;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }

        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            username: user.username,
            password: user.password_hash,
            role: user.role,
            skills: user.skills,
            created_at: Some(Utc::now()),
        };
        inner.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&user_id).map(|u| inner.profile(u)))
    }

    async fn set_skills(&self, user_id: i64, skills: &[String]) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&user_id) {
            Some(user) => {
                user.skills = skills.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_question(&self, question: NewQuestion) -> Result<Question, AppError> {
        let mut inner = self.inner.lock().await;
        inner.next_question_id += 1;
        let created = Question {
            id: inner.next_question_id,
            skill: question.skill,
            question: question.question,
            options: question.options,
            answer: question.answer,
        };
        inner.questions.push(created.clone());
        Ok(created)
    }

    // Bank order rather than random order, which keeps sessions reproducible.
    async fn draw_questions(&self, skill: &str, limit: usize) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.lock().await;
        let wanted = skill.to_lowercase();
        Ok(inner
            .questions
            .iter()
            .filter(|q| q.skill.to_lowercase() == wanted)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(&session.session_id) {
            return Err(AppError::Conflict("Session id already issued".to_string()));
        }
        inner
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.sessions.get(session_id).cloned())
    }

    async fn get_score(&self, session_id: &str) -> Result<Option<ScoredSession>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.scores.get(session_id).cloned())
    }

    async fn record_score(&self, scored: ScoredSession) -> Result<RecordOutcome, AppError> {
        let mut inner = self.inner.lock().await;

        if !inner.sessions.contains_key(&scored.session_id) {
            return Err(AppError::UnknownSession("Session not found".to_string()));
        }
        if let Some(existing) = inner.scores.get(&scored.session_id) {
            return Ok(RecordOutcome::AlreadyScored(existing.clone()));
        }

        if scored.passed {
            inner.insert_verified(
                scored.user_id,
                &scored.skill,
                VerifiedEntry {
                    verified_by: None,
                    session_id: Some(scored.session_id.clone()),
                    verified_at: scored.scored_at,
                },
            );
        }
        inner
            .scores
            .insert(scored.session_id.clone(), scored.clone());

        Ok(RecordOutcome::Recorded(scored))
    }

    async fn verify_skill(
        &self,
        user_id: i64,
        skill: &str,
        verified_by: Option<i64>,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(inner.insert_verified(
            user_id,
            skill,
            VerifiedEntry {
                verified_by,
                session_id: None,
                verified_at: Utc::now(),
            },
        ))
    }

    async fn unverify_skill(&self, user_id: i64, skill: &str) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user_id) {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        let removed = inner
            .verified
            .get_mut(&user_id)
            .and_then(|m| m.remove(skill));
        if let Some(entry) = &removed {
            tracing::debug!(
                user_id,
                skill,
                verified_by = ?entry.verified_by,
                verified_at = %entry.verified_at,
                "Dropping verified entry"
            );
        }
        Ok(removed.is_some())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().await;
        let Inner {
            sessions, scores, ..
        } = &mut *inner;

        let before = sessions.len();
        sessions.retain(|id, s| scores.contains_key(id) || !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password_hash: "hash".to_string(),
            role: "user".to_string(),
            skills: vec!["rust".to_string()],
        }
    }

    fn session(id: &str, user_id: i64, ttl: Duration) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: id.to_string(),
            user_id,
            skill: "rust".to_string(),
            questions: Vec::new(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    fn scored(id: &str, user_id: i64, passed: bool) -> ScoredSession {
        ScoredSession {
            session_id: id.to_string(),
            user_id,
            skill: "rust".to_string(),
            correct: if passed { 3 } else { 0 },
            total: 3,
            passed,
            answers: Default::default(),
            scored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("ada")).await.unwrap();
        let err = store.create_user(new_user("ada")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_record_score_first_write_wins() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("ada")).await.unwrap();
        store
            .insert_session(&session("s1", user.id, Duration::minutes(5)))
            .await
            .unwrap();

        let first = store.record_score(scored("s1", user.id, true)).await.unwrap();
        assert!(matches!(first, RecordOutcome::Recorded(_)));

        let second = store.record_score(scored("s1", user.id, false)).await.unwrap();
        match second {
            RecordOutcome::AlreadyScored(s) => assert!(s.passed),
            other => panic!("expected AlreadyScored, got {:?}", other),
        }

        let profile = store.get_profile(user.id).await.unwrap().unwrap();
        assert!(profile.is_verified("rust"));
        assert_eq!(store.verified_source(user.id, "rust").await.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_failed_score_leaves_verified_set_alone() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("ada")).await.unwrap();
        store
            .insert_session(&session("s1", user.id, Duration::minutes(5)))
            .await
            .unwrap();
        store.record_score(scored("s1", user.id, false)).await.unwrap();

        let profile = store.get_profile(user.id).await.unwrap().unwrap();
        assert!(profile.verified_skills.is_empty());
    }

    #[tokio::test]
    async fn test_purge_keeps_scored_and_live_sessions() {
        let store = MemoryStore::new();
        store
            .insert_session(&session("expired", 1, Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .insert_session(&session("scored", 1, Duration::seconds(-1)))
            .await
            .unwrap();
        store
            .insert_session(&session("live", 1, Duration::minutes(5)))
            .await
            .unwrap();
        store.record_score(scored("scored", 1, false)).await.unwrap();

        let purged = store.purge_expired_sessions(Utc::now()).await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get_session("expired").await.unwrap().is_none());
        assert!(store.get_session("scored").await.unwrap().is_some());
        assert!(store.get_session("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_draw_questions_matches_skill_case_insensitively() {
        let store = MemoryStore::new();
        for skill in ["Rust", "rust", "go"] {
            store
                .add_question(NewQuestion {
                    skill: skill.to_string(),
                    question: "q".to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    answer: "a".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.draw_questions("RUST", 10).await.unwrap().len(), 2);
        assert_eq!(store.draw_questions("rust", 1).await.unwrap().len(), 1);
        assert!(store.draw_questions("python", 10).await.unwrap().is_empty());
    }
}
