// src/models/session.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::{PublicQuestion, Question};

/// The user's selections keyed by question id.
/// A missing entry means the question was left unanswered.
pub type AnswerSet = HashMap<i64, String>;

/// Session as sent to the test taker. Carries no answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub skill: String,
    pub questions: Vec<PublicQuestion>,
}

impl Session {
    pub fn question(&self, question_id: i64) -> Option<&PublicQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// Server-side session row, including the answer key.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: i64,
    pub skill: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Strips the answer key.
    pub fn to_public(&self) -> Session {
        Session {
            session_id: self.session_id.clone(),
            skill: self.skill.clone(),
            questions: self.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// DTO for `POST /api/verification/start`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub skill: String,
}

/// DTO for `POST /api/verification/submit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitSessionRequest {
    pub session_id: String,

    /// Key: Question ID, Value: selected option.
    #[serde(default)]
    pub answers: AnswerSet,

    /// Ask for the answer key alongside the score.
    #[serde(default)]
    pub include_solutions: bool,
}
