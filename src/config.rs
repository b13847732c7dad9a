// src/config.rs

use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;

/// Minimum score percentage required to mark a skill verified.
pub const PASS_THRESHOLD: u32 = 70;

/// Countdown length for a single question, in ticks (one tick per second).
pub const QUESTION_SECONDS: u32 = 30;

/// How often the background reaper looks for abandoned sessions.
pub const REAPER_INTERVAL_SECS: u64 = 60;

/// Longest lease an open session can be given (30 days).
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Upper bound on questions drawn into one session.
    pub questions_per_session: usize,
    /// Lease on an open (unscored) session.
    pub session_ttl_secs: u64,
    pub bind_addr: SocketAddr,
    /// Optional JSON file of questions loaded into the bank at boot.
    pub question_bank_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        let questions_per_session = env::var("QUESTIONS_PER_SESSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(5);

        let session_ttl_secs = env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3_600)
            .min(MAX_SESSION_TTL_SECS);

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let question_bank_path = env::var("QUESTION_BANK_PATH").ok().filter(|s| !s.is_empty());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
            questions_per_session,
            session_ttl_secs,
            bind_addr,
            question_bank_path,
        }
    }
}
