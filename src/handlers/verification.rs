// src/handlers/verification.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        result::SolutionsResponse,
        session::{StartSessionRequest, SubmitSessionRequest},
    },
    service::AssessmentService,
    utils::jwt::Claims,
};

/// Starts a timed verification test for one of the caller's skills.
///
/// Returns the session id and its questions. The answer key stays server-side.
pub async fn start_session(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let session = service.start_session(user_id, &req.skill).await?;
    Ok(Json(session))
}

/// Submits the answers of a session and returns the score.
///
/// * First submission wins; a retry gets the stored result back.
/// * A pass adds the skill to the caller's verified skills.
/// * `include_solutions` attaches the answer key to the response.
pub async fn submit_session(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let result = service
        .submit_session(user_id, &req.session_id, req.answers, req.include_solutions)
        .await?;
    Ok(Json(result))
}

/// Answer key for an already-scored session.
pub async fn reveal_solutions(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let solutions = service.reveal_solutions(user_id, &session_id).await?;
    Ok(Json(SolutionsResponse {
        session_id,
        solutions,
    }))
}
