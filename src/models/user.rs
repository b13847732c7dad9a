// src/models/user.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    /// Skills the user declares, in the order they listed them.
    pub skills: Vec<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Fields needed to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub skills: Vec<String>,
}

/// Authoritative profile view returned by `GET /api/users/{id}`.
///
/// `verified_skills` is keyed by skill name; a key is present only while the
/// user holds a passing result (or a manual verification) for that skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub skills: Vec<String>,
    #[serde(default)]
    pub verified_skills: BTreeMap<String, bool>,
}

impl UserProfile {
    pub fn is_verified(&self, skill: &str) -> bool {
        self.verified_skills.get(skill).copied().unwrap_or(false)
    }

    /// A skill can be tested only when it is declared and not yet verified.
    pub fn is_eligible(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill) && !self.is_verified(skill)
    }

    /// Declared skills still waiting for a passing test.
    pub fn unverified_skills(&self) -> impl Iterator<Item = &str> {
        self.skills
            .iter()
            .map(String::as_str)
            .filter(|s| !self.is_verified(s))
    }
}

/// Response for `GET /api/users/{id}/skills`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SkillsResponse {
    pub user_id: i64,
    pub skills: Vec<String>,
    pub verified_skills: BTreeMap<String, bool>,
}

impl From<UserProfile> for SkillsResponse {
    fn from(p: UserProfile) -> Self {
        Self {
            user_id: p.user_id,
            skills: p.skills,
            verified_skills: p.verified_skills,
        }
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = validate_skills))]
    pub skills: Vec<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for replacing the declared skill list.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSkillsRequest {
    #[validate(custom(function = validate_skills))]
    pub skills: Vec<String>,
}

pub fn validate_skills(skills: &[String]) -> Result<(), validator::ValidationError> {
    if skills.len() > 50 {
        return Err(validator::ValidationError::new("too_many_skills"));
    }
    for (i, skill) in skills.iter().enumerate() {
        let trimmed = skill.trim();
        if trimmed.is_empty() || trimmed.len() > 64 {
            return Err(validator::ValidationError::new("invalid_skill_name"));
        }
        if skills[..i].iter().any(|s| s.trim() == trimmed) {
            return Err(validator::ValidationError::new("duplicate_skill"));
        }
    }
    Ok(())
}

/// Trims every skill name; order is preserved.
pub fn normalize_skills(skills: Vec<String>) -> Vec<String> {
    skills.into_iter().map(|s| s.trim().to_string()).collect()
}
