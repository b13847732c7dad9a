// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        question::{NewQuestion, Question},
        result::{RecordOutcome, ScoredSession},
        session::{AnswerSet, SessionRecord},
        user::{NewUser, User, UserProfile},
    },
    store::AssessmentStore,
};

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    role: String,
    skills: Json<Vec<String>>,
    created_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            password: r.password,
            role: r.role,
            skills: r.skills.0,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    skill: String,
    question: String,
    options: Json<Vec<String>>,
    answer: String,
}

impl From<QuestionRow> for Question {
    fn from(r: QuestionRow) -> Self {
        Question {
            id: r.id,
            skill: r.skill,
            question: r.question,
            options: r.options.0,
            answer: r.answer,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: String,
    user_id: i64,
    skill: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ScoreRow {
    session_id: String,
    user_id: i64,
    skill: String,
    correct: i32,
    total: i32,
    passed: bool,
    answers: Json<AnswerSet>,
    scored_at: DateTime<Utc>,
}

impl From<ScoreRow> for ScoredSession {
    fn from(r: ScoreRow) -> Self {
        ScoredSession {
            session_id: r.session_id,
            user_id: r.user_id,
            skill: r.skill,
            correct: r.correct.max(0) as u32,
            total: r.total.max(0) as u32,
            passed: r.passed,
            answers: r.answers.0,
            scored_at: r.scored_at,
        }
    }
}

const SELECT_SCORE: &str = r#"
    SELECT session_id, user_id, skill, correct, total, passed, answers, scored_at
    FROM session_scores
    WHERE session_id = $1
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password, role, skills)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, password, role, skills, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(Json(&user.skills))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", user.username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, role, skills, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError> {
        let Some(user) = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, role, skills, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let verified: Vec<String> =
            sqlx::query_scalar("SELECT skill FROM verified_skills WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(UserProfile {
            user_id: user.id,
            username: user.username,
            role: user.role,
            skills: user.skills.0,
            verified_skills: verified.into_iter().map(|s| (s, true)).collect(),
        }))
    }

    async fn set_skills(&self, user_id: i64, skills: &[String]) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET skills = $1 WHERE id = $2")
            .bind(Json(skills))
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_question(&self, question: NewQuestion) -> Result<Question, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(
            r#"
            INSERT INTO questions (skill, question, options, answer)
            VALUES ($1, $2, $3, $4)
            RETURNING id, skill, question, options, answer
            "#,
        )
        .bind(&question.skill)
        .bind(&question.question)
        .bind(Json(&question.options))
        .bind(&question.answer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::from(e)
        })?;

        Ok(row.into())
    }

    async fn draw_questions(&self, skill: &str, limit: usize) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, skill, question, options, answer
            FROM questions
            WHERE LOWER(skill) = LOWER($1)
            ORDER BY RANDOM()
            LIMIT $2
            "#,
        )
        .bind(skill)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to draw questions for {}: {:?}", skill, e);
            AppError::from(e)
        })?;

        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn insert_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO assessment_sessions (id, user_id, skill, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(&session.skill)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Session id already issued".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        for (position, q) in session.questions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO session_questions
                    (session_id, position, question_id, question, options, answer)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&session.session_id)
            .bind(position as i32)
            .bind(q.id)
            .bind(&q.question)
            .bind(Json(&q.options))
            .bind(&q.answer)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError> {
        let Some(row) = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, skill, created_at, expires_at
            FROM assessment_sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT sq.question_id AS id, s.skill, sq.question, sq.options, sq.answer
            FROM session_questions sq
            JOIN assessment_sessions s ON s.id = sq.session_id
            WHERE sq.session_id = $1
            ORDER BY sq.position
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(SessionRecord {
            session_id: row.id,
            user_id: row.user_id,
            skill: row.skill,
            questions: questions.into_iter().map(Question::from).collect(),
            created_at: row.created_at,
            expires_at: row.expires_at,
        }))
    }

    async fn get_score(&self, session_id: &str) -> Result<Option<ScoredSession>, AppError> {
        let row = sqlx::query_as::<_, ScoreRow>(SELECT_SCORE)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ScoredSession::from))
    }

    async fn record_score(&self, scored: ScoredSession) -> Result<RecordOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent submissions for the same session.
        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM assessment_sessions WHERE id = $1 FOR UPDATE")
                .bind(&scored.session_id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(AppError::UnknownSession("Session not found".to_string()));
        }

        if let Some(existing) = sqlx::query_as::<_, ScoreRow>(SELECT_SCORE)
            .bind(&scored.session_id)
            .fetch_optional(&mut *tx)
            .await?
        {
            tx.commit().await?;
            return Ok(RecordOutcome::AlreadyScored(existing.into()));
        }

        sqlx::query(
            r#"
            INSERT INTO session_scores
                (session_id, user_id, skill, correct, total, passed, answers, scored_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&scored.session_id)
        .bind(scored.user_id)
        .bind(&scored.skill)
        .bind(scored.correct as i32)
        .bind(scored.total as i32)
        .bind(scored.passed)
        .bind(Json(&scored.answers))
        .bind(scored.scored_at)
        .execute(&mut *tx)
        .await?;

        if scored.passed {
            sqlx::query(
                r#"
                INSERT INTO verified_skills (user_id, skill, session_id, verified_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, skill) DO NOTHING
                "#,
            )
            .bind(scored.user_id)
            .bind(&scored.skill)
            .bind(&scored.session_id)
            .bind(scored.scored_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit score for {}: {:?}", scored.session_id, e);
            AppError::from(e)
        })?;

        Ok(RecordOutcome::Recorded(scored))
    }

    async fn verify_skill(
        &self,
        user_id: i64,
        skill: &str,
        verified_by: Option<i64>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO verified_skills (user_id, skill, verified_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, skill) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(skill)
        .bind(verified_by)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_foreign_key_violation() {
                    return AppError::NotFound("User not found".to_string());
                }
            }
            AppError::from(e)
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn unverify_skill(&self, user_id: i64, skill: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM verified_skills WHERE user_id = $1 AND skill = $2")
            .bind(user_id)
            .bind(skill)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM assessment_sessions s
            WHERE s.expires_at <= $1
              AND NOT EXISTS (SELECT 1 FROM session_scores sc WHERE sc.session_id = s.id)
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
