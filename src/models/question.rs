// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::service::scoring::normalize_answer;

/// A bank question, including its answer key.
/// Never serialized to test takers; see [`PublicQuestion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Skill this question assesses.
    pub skill: String,

    /// The text content of the question.
    pub question: String,

    /// Ordered, distinct answer choices.
    pub options: Vec<String>,

    /// The correct option, verbatim.
    pub answer: String,
}

/// DTO for sending question to client (excludes answer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question: q.question.clone(),
            options: q.options.clone(),
        }
    }
}

/// Fields needed to insert a bank question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub skill: String,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = validate_answer_is_option))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 64))]
    pub skill: String,
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 || options.len() > 8 {
        return Err(validator::ValidationError::new("options_count_out_of_range"));
    }
    for (i, opt) in options.iter().enumerate() {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
        // Options must stay distinct after the same normalisation scoring uses.
        let key = normalize_answer(opt);
        if options[..i].iter().any(|o| normalize_answer(o) == key) {
            return Err(validator::ValidationError::new("options_must_be_distinct"));
        }
    }
    Ok(())
}

fn validate_answer_is_option(
    req: &CreateQuestionRequest,
) -> Result<(), validator::ValidationError> {
    if !req.options.contains(&req.answer) {
        return Err(validator::ValidationError::new("answer_must_be_an_option"));
    }
    Ok(())
}
