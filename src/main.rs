// src/main.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use skill_verify::config::{Config, REAPER_INTERVAL_SECS};
use skill_verify::models::question::{CreateQuestionRequest, NewQuestion};
use skill_verify::models::user::NewUser;
use skill_verify::routes;
use skill_verify::state::AppState;
use skill_verify::store::{AssessmentStore, MemoryStore, PgStore};
use skill_verify::utils::hash::hash_password;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let store: Arc<dyn AssessmentStore> = match &config.database_url {
        Some(url) => Arc::new(connect_postgres(url).await),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    if let Err(e) = seed_admin_user(store.as_ref(), &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    if let Some(path) = &config.question_bank_path {
        match seed_question_bank(store.as_ref(), path).await {
            Ok(n) => tracing::info!("Loaded {} questions from {}", n, path),
            Err(e) => tracing::error!("Failed to load question bank {}: {}", path, e),
        }
    }

    let state = AppState::new(store, config.clone());
    let _reaper = state
        .service
        .spawn_reaper(Duration::from_secs(REAPER_INTERVAL_SECS));

    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listen address");

    axum::serve(listener, app).await.expect("Server error");
}

async fn connect_postgres(url: &str) -> PgStore {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected...");

    let store = PgStore::new(pool);

    tracing::info!("Running migrations...");
    store
        .migrate()
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    store
}

async fn seed_admin_user(
    store: &dyn AssessmentStore,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        if store.find_user_by_username(username).await?.is_none() {
            tracing::info!("Seeding admin user: {}", username);
            store
                .create_user(NewUser {
                    username: username.clone(),
                    password_hash: hash_password(password)?,
                    role: "admin".to_string(),
                    skills: Vec::new(),
                })
                .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}

/// Loads a JSON array of questions (same shape as `POST /api/admin/questions`).
/// Skills that already have questions in the store are left alone, so a
/// persistent bank is not duplicated on every boot.
async fn seed_question_bank(
    store: &dyn AssessmentStore,
    path: &str,
) -> Result<usize, Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let questions: Vec<CreateQuestionRequest> = serde_json::from_str(&raw)?;

    let mut populated: HashMap<String, bool> = HashMap::new();
    let mut loaded = 0;
    for q in questions {
        if let Err(e) = q.validate() {
            tracing::warn!("Skipping invalid bank question {:?}: {}", q.question, e);
            continue;
        }

        let skill_key = q.skill.trim().to_lowercase();
        let already_seeded = match populated.get(&skill_key) {
            Some(seeded) => *seeded,
            None => {
                let seeded = !store.draw_questions(&skill_key, 1).await?.is_empty();
                populated.insert(skill_key, seeded);
                seeded
            }
        };
        if already_seeded {
            continue;
        }

        store
            .add_question(NewQuestion {
                skill: q.skill.trim().to_string(),
                question: q.question.trim().to_string(),
                options: q.options,
                answer: q.answer,
            })
            .await?;
        loaded += 1;
    }
    Ok(loaded)
}
