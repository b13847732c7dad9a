// src/handlers/profile.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{SkillsResponse, UpdateSkillsRequest, normalize_skills},
    service::AssessmentService,
    utils::jwt::Claims,
};

/// Current user's profile, including verified skills.
pub async fn get_me(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let profile = service.profile(claims.user_id()?).await?;
    Ok(Json(profile))
}

/// Authoritative profile read. Clients re-fetch this after a pass.
pub async fn get_user(
    State(service): State<Arc<AssessmentService>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(service.profile(id).await?))
}

pub async fn get_user_skills(
    State(service): State<Arc<AssessmentService>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = service.profile(id).await?;
    Ok(Json(SkillsResponse::from(profile)))
}

/// Replaces the caller's declared skills.
/// Verified entries are untouched; only an explicit unverify removes them.
pub async fn update_my_skills(
    State(service): State<Arc<AssessmentService>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateSkillsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    let skills = normalize_skills(payload.skills);

    if !service.store().set_skills(user_id, &skills).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(service.profile(user_id).await?))
}
