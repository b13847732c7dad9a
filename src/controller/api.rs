// src/controller/api.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    controller::error::ControllerError,
    models::{
        result::AssessmentResult,
        session::{AnswerSet, Session, StartSessionRequest, SubmitSessionRequest},
        user::UserProfile,
    },
    service::AssessmentService,
};

/// What the controller needs from the assessment service.
#[async_trait]
pub trait AssessmentApi: Send + Sync {
    async fn start(&self, skill: &str) -> Result<Session, ControllerError>;

    async fn submit(
        &self,
        session_id: &str,
        answers: &AnswerSet,
        include_solutions: bool,
    ) -> Result<AssessmentResult, ControllerError>;

    async fn get_user(&self, user_id: i64) -> Result<UserProfile, ControllerError>;
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    user_id: i64,
}

/// HTTP client for the `/api` routes, authenticated with a bearer token.
#[derive(Clone)]
pub struct HttpAssessmentApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAssessmentApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Signs in and keeps the token. Returns the user id.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<i64, ControllerError> {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let login: LoginResponse = read_json(resp).await?;
        self.token = Some(login.token);
        Ok(login.user_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str, ControllerError> {
        self.token.as_deref().ok_or(ControllerError::Unauthenticated)
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ControllerError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<T>()
            .await
            .map_err(|e| ControllerError::NetworkFailure(e.to_string()));
    }

    let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    Err(match status {
        StatusCode::UNAUTHORIZED => ControllerError::Unauthenticated,
        StatusCode::UNPROCESSABLE_ENTITY => ControllerError::InvalidSkill(message),
        StatusCode::GONE => ControllerError::UnknownSession(message),
        other => ControllerError::Rejected {
            status: other.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl AssessmentApi for HttpAssessmentApi {
    async fn start(&self, skill: &str) -> Result<Session, ControllerError> {
        let resp = self
            .client
            .post(self.url("/api/verification/start"))
            .bearer_auth(self.bearer()?)
            .json(&StartSessionRequest {
                skill: skill.to_string(),
            })
            .send()
            .await?;

        read_json(resp).await
    }

    async fn submit(
        &self,
        session_id: &str,
        answers: &AnswerSet,
        include_solutions: bool,
    ) -> Result<AssessmentResult, ControllerError> {
        let resp = self
            .client
            .post(self.url("/api/verification/submit"))
            .bearer_auth(self.bearer()?)
            .json(&SubmitSessionRequest {
                session_id: session_id.to_string(),
                answers: answers.clone(),
                include_solutions,
            })
            .send()
            .await?;

        read_json(resp).await.map_err(|e| match e {
            ControllerError::Rejected { status: 404, message } => {
                ControllerError::UnknownSession(message)
            }
            other => other,
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<UserProfile, ControllerError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/users/{}", user_id)))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        read_json(resp).await
    }
}

/// Calls the service directly, for a controller embedded in the same process.
#[derive(Clone)]
pub struct InProcessApi {
    service: Arc<AssessmentService>,
    user_id: Option<i64>,
}

impl InProcessApi {
    pub fn new(service: Arc<AssessmentService>, user_id: Option<i64>) -> Self {
        Self { service, user_id }
    }

    fn caller(&self) -> Result<i64, ControllerError> {
        self.user_id.ok_or(ControllerError::Unauthenticated)
    }
}

#[async_trait]
impl AssessmentApi for InProcessApi {
    async fn start(&self, skill: &str) -> Result<Session, ControllerError> {
        Ok(self.service.start_session(self.caller()?, skill).await?)
    }

    async fn submit(
        &self,
        session_id: &str,
        answers: &AnswerSet,
        include_solutions: bool,
    ) -> Result<AssessmentResult, ControllerError> {
        Ok(self
            .service
            .submit_session(self.caller()?, session_id, answers.clone(), include_solutions)
            .await?)
    }

    async fn get_user(&self, user_id: i64) -> Result<UserProfile, ControllerError> {
        self.caller()?;
        Ok(self.service.profile(user_id).await?)
    }
}
