// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, NewUser, normalize_skills},
    service::AssessmentService,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user with their declared skills.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the new profile (nothing verified yet).
pub async fn register(
    State(service): State<Arc<AssessmentService>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = service
        .store()
        .create_user(NewUser {
            username: payload.username,
            password_hash: hashed_password,
            role: "user".to_string(),
            skills: normalize_skills(payload.skills),
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    let profile = service.profile(user.id).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(service): State<Arc<AssessmentService>>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = service
        .store()
        .find_user_by_username(&payload.username)
        .await?
        .ok_or(AppError::AuthError("User not found".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user_id": user.id,
    })))
}
