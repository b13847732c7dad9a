// tests/profile_tests.rs

use std::sync::Arc;

use serde_json::{Value, json};
use skill_verify::{
    config::Config,
    routes,
    state::AppState,
    store::{AssessmentStore, MemoryStore},
};

async fn spawn_app() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        questions_per_session: 5,
        session_ttl_secs: 3600,
        bind_addr: ([127, 0, 0, 1], 0).into(),
        question_bank_path: None,
    };

    let app = routes::create_router(AppState::new(store.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{}", port), store)
}

async fn register_and_login(
    client: &reqwest::Client,
    address: &str,
    username: &str,
    skills: &[&str],
) -> (String, i64) {
    client
        .post(&format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": "password123", "skills": skills }))
        .send()
        .await
        .unwrap();

    let login = client
        .post(&format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();

    (
        login["token"].as_str().unwrap().to_string(),
        login["user_id"].as_i64().unwrap(),
    )
}

#[tokio::test]
async fn test_profile_endpoints() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let (token_a, user_a) = register_and_login(&client, &address, "ada", &["rust", "sql"]).await;
    let (token_b, _) = register_and_login(&client, &address, "bob", &["go"]).await;

    // Verification written out of band shows up on the next read.
    store.verify_skill(user_a, "sql", None).await.unwrap();

    let me = client
        .get(&format!("{}/api/me", address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(me["user_id"], user_a);
    assert_eq!(me["username"], "ada");
    assert_eq!(me["role"], "user");
    assert_eq!(me["skills"], json!(["rust", "sql"]));
    assert_eq!(me["verified_skills"], json!({ "sql": true }));

    // Any signed-in user can read another profile.
    let skills = client
        .get(&format!("{}/api/users/{}/skills", address, user_a))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(skills["user_id"], user_a);
    assert_eq!(skills["skills"], json!(["rust", "sql"]));
    assert_eq!(skills["verified_skills"], json!({ "sql": true }));
    assert!(skills.get("username").is_none());

    let missing = client
        .get(&format!("{}/api/users/{}", address, 9999))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let anonymous = client
        .get(&format!("{}/api/me", address))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);
}

#[tokio::test]
async fn test_updating_skills_keeps_verifications() {
    let (address, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let (token, user_id) = register_and_login(&client, &address, "ada", &["rust", "sql"]).await;
    store.verify_skill(user_id, "sql", None).await.unwrap();

    let updated = client
        .put(&format!("{}/api/me/skills", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "skills": ["rust", " go "] }))
        .send()
        .await
        .unwrap();
    assert_eq!(updated.status().as_u16(), 200);

    let profile = updated.json::<Value>().await.unwrap();
    assert_eq!(profile["skills"], json!(["rust", "go"]));
    assert_eq!(profile["verified_skills"], json!({ "sql": true }));

    let invalid = client
        .put(&format!("{}/api/me/skills", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({ "skills": ["rust", ""] }))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status().as_u16(), 400);
}
