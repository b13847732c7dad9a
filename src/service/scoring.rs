// src/service/scoring.rs

use crate::{
    config::PASS_THRESHOLD,
    models::{
        question::Question,
        result::{AssessmentResult, Solution},
        session::AnswerSet,
    },
};

/// Canonical form used when comparing a submitted option with the key:
/// surrounding whitespace trimmed, lower-cased.
pub fn normalize_answer(answer: &str) -> String {
    answer.trim().to_lowercase()
}

pub fn answers_match(submitted: &str, correct: &str) -> bool {
    normalize_answer(submitted) == normalize_answer(correct)
}

/// Counts correct answers against the session's key.
/// Returns (correct_count, total_questions). Unanswered questions and answers
/// for ids outside the session count for nothing.
pub fn calculate_score(answers: &AnswerSet, key: &[Question]) -> (u32, u32) {
    let correct = key
        .iter()
        .filter(|q| {
            answers
                .get(&q.id)
                .is_some_and(|given| answers_match(given, &q.answer))
        })
        .count();

    (correct as u32, key.len() as u32)
}

/// `round(100 * correct / total)`, half rounding up.
pub fn score_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (c, t) = (correct as u64, total as u64);
    ((200 * c + t) / (2 * t)) as u32
}

/// Pass decision on the exact ratio, not on the rounded percentage.
pub fn is_passing(correct: u32, total: u32) -> bool {
    total > 0 && (correct as u64) * 100 >= (PASS_THRESHOLD as u64) * (total as u64)
}

pub fn build_result(correct: u32, total: u32) -> AssessmentResult {
    AssessmentResult {
        correct,
        total,
        score_percent: score_percent(correct, total),
        passed: is_passing(correct, total),
        solutions: None,
    }
}

/// Pairs the key with what the user submitted, in session order.
pub fn solutions(key: &[Question], answers: &AnswerSet) -> Vec<Solution> {
    key.iter()
        .map(|q| Solution {
            id: q.id,
            question: q.question.clone(),
            correct_answer: q.answer.clone(),
            your_answer: answers.get(&q.id).cloned(),
        })
        .collect()
}
