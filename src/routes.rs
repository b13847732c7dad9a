// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, profile, verification},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, users, verification, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (service + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let user_routes = Router::new()
        .route("/users/{id}", get(profile::get_user))
        .route("/users/{id}/skills", get(profile::get_user_skills))
        .route("/me", get(profile::get_me))
        .route("/me/skills", put(profile::update_my_skills))
        .layer(require_auth.clone());

    let verification_routes = Router::new()
        .route("/start", post(verification::start_session))
        .route("/submit", post(verification::submit_session))
        .route("/{session_id}/solutions", get(verification::reveal_solutions))
        .layer(require_auth.clone());

    let admin_routes = Router::new()
        .route("/questions", post(admin::create_question))
        .route(
            "/users/{id}/skills/{skill}/verify",
            post(admin::verify_skill),
        )
        .route(
            "/users/{id}/skills/{skill}/unverify",
            post(admin::unverify_skill),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api", user_routes)
        .nest("/api/verification", verification_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, store::MemoryStore};

    fn app() -> Router {
        let config = Config {
            database_url: None,
            jwt_secret: "secret".to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            questions_per_session: 5,
            session_ttl_secs: 3600,
            bind_addr: ([127, 0, 0, 1], 0).into(),
            question_bank_path: None,
        };
        create_router(AppState::new(Arc::new(MemoryStore::new()), config))
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_bearer_token() {
        for (method, uri) in [
            ("GET", "/api/me"),
            ("GET", "/api/users/1"),
            ("POST", "/api/verification/start"),
            ("POST", "/api/verification/submit"),
            ("GET", "/api/verification/abc/solutions"),
            ("POST", "/api/admin/questions"),
        ] {
            let response = app()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), 401, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
    }
}
