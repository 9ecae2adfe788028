// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, exam},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (exam, auth, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (store, question bank, config).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let exam_routes = Router::new()
        .route("/validate-code", post(exam::validate_code))
        .route("/start", post(exam::start_exam))
        .route("/answer", post(exam::submit_answer))
        .route("/complete", post(exam::complete_exam));

    let auth_routes = Router::new().route("/admin-login", post(auth::admin_login));

    let admin_routes = Router::new()
        .route(
            "/exam-codes",
            get(admin::list_exam_codes).post(admin::create_exam_code),
        )
        .route("/exam-codes/{id}", patch(admin::update_exam_code))
        .route("/attempts", get(admin::list_attempts))
        .route(
            "/attempts/{id}",
            get(admin::get_attempt).delete(admin::delete_attempt),
        )
        .route("/grade-answer", post(admin::grade_answer))
        .route("/stats", get(admin::get_stats))
        // Auth runs first, then the admin role check
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
                .layer(middleware::from_fn(admin_middleware)),
        );

    Router::new()
        .nest("/api/exam", exam_routes)
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
