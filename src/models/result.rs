// src/models/result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::AnswerSet;

/// Scored outcome of one submitted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub correct: u32,
    pub total: u32,
    /// `round(100 * correct / total)`, for display.
    pub score_percent: u32,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solutions: Option<Vec<Solution>>,
}

/// One answer-key entry, released only after scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub id: i64,
    pub question: String,
    pub correct_answer: String,
    pub your_answer: Option<String>,
}

/// Stored score for a session. At most one exists per session id.
#[derive(Debug, Clone)]
pub struct ScoredSession {
    pub session_id: String,
    pub user_id: i64,
    pub skill: String,
    pub correct: u32,
    pub total: u32,
    pub passed: bool,
    pub answers: AnswerSet,
    pub scored_at: DateTime<Utc>,
}

/// Outcome of the compare-and-swap that stores a score.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// This call stored the score (and applied the verified write on a pass).
    Recorded(ScoredSession),
    /// A score was already stored; it is returned unchanged.
    AlreadyScored(ScoredSession),
}

/// Response for `GET /api/verification/{session_id}/solutions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SolutionsResponse {
    pub session_id: String,
    pub solutions: Vec<Solution>,
}
