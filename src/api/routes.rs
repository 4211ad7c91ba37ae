//! Router assembly: public routes merged with the bearer-protected surface.

use crate::api::{admin, faculty, student};
use crate::auth::{api as auth_api, auth_middleware, JwtHandler};
use crate::config::Config;
use crate::engine::AttendanceEngine;
use crate::store::Database;
use axum::{
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: AttendanceEngine,
    pub jwt: Arc<JwtHandler>,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        let engine = AttendanceEngine::new(db.clone());
        let jwt = Arc::new(JwtHandler::new(
            config.jwt_secret.clone(),
            config.token_ttl_hours,
        ));
        Self { db, engine, jwt }
    }
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(auth_api::login))
        .route("/register/student", post(auth_api::register_student))
        .route("/register/faculty", post(auth_api::register_faculty))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/faculty/session/create", post(faculty::create_session))
        .route(
            "/faculty/session/:id/attendances",
            get(faculty::session_attendances),
        )
        .route("/faculty/courses", get(faculty::my_courses))
        .route("/faculty/profile", get(faculty::profile))
        .route("/student/attendance/mark", post(student::mark_attendance))
        .route("/student/attendance/history", get(student::history))
        .route("/student/profile", get(student::profile))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/course", post(admin::create_course))
        .route("/admin/course/:id", delete(admin::delete_course))
        .route("/admin/enrollment", post(admin::create_enrollment))
        .route("/admin/student/:id", delete(admin::delete_student))
        .route("/admin/faculty/:id", delete(admin::delete_faculty))
        .route(
            "/admin/session/:id/deactivate",
            post(admin::deactivate_session),
        )
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(crate::middleware::request_logging))
        .layer(CorsLayer::permissive())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
