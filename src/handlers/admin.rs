// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, NewQuestion, PublicQuestion},
    service::AssessmentService,
    utils::jwt::Claims,
};

/// Adds a question to the bank.
/// Admin only.
pub async fn create_question(
    State(service): State<Arc<AssessmentService>>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let question = service
        .store()
        .add_question(NewQuestion {
            skill: payload.skill.trim().to_string(),
            question: payload.question.trim().to_string(),
            options: payload.options,
            answer: payload.answer,
        })
        .await?;

    tracing::info!(question_id = question.id, skill = %question.skill, "Question added");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "skill": question.skill,
            "question": PublicQuestion::from(&question),
        })),
    ))
}

/// Marks a skill verified without a test, recording who vouched for it.
/// Admin only.
pub async fn verify_skill(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path((user_id, skill)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    service.profile(user_id).await?;
    let verifier = claims.user_id()?;

    let added = service
        .store()
        .verify_skill(user_id, &skill, Some(verifier))
        .await?;
    if added {
        tracing::info!(user_id, skill = %skill, verifier, "Skill verified manually");
    }

    Ok(Json(json!({
        "user_id": user_id,
        "skill": skill,
        "verified": true,
    })))
}

/// Removes a skill from the verified set.
/// Admin only. This is the only path that ever clears a verification.
pub async fn unverify_skill(
    State(service): State<Arc<AssessmentService>>,
    Path((user_id, skill)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    service.profile(user_id).await?;

    let removed = service.store().unverify_skill(user_id, &skill).await?;
    if !removed {
        return Err(AppError::NotFound(format!("'{}' is not verified", skill)));
    }
    tracing::info!(user_id, skill = %skill, "Skill unverified");

    Ok(Json(json!({
        "user_id": user_id,
        "skill": skill,
        "verified": false,
    })))
}
