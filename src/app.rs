use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, rate_limit_middleware, require_admin_middleware, RateLimiter};
use crate::observer::{DispatchReport, Effects, ObserverPipeline};

/// Everything a request needs, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseManager,
    pub observers: Arc<ObserverPipeline>,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig, db: DatabaseManager) -> Self {
        Self::with_observers(config, db, ObserverPipeline::with_defaults())
    }

    pub fn with_observers(config: AppConfig, db: DatabaseManager, observers: ObserverPipeline) -> Self {
        let limiter = RateLimiter::from_config(&config.api);
        Self { config: Arc::new(config), db, observers: Arc::new(observers), limiter }
    }

    /// Run post-commit side effects. Call only after the mutation has committed.
    pub async fn dispatch(&self, effects: Effects) -> DispatchReport {
        self.observers.dispatch(self.db.pool(), effects).await
    }
}

pub fn app(state: AppState) -> Router {
    let protected = protected_routes().route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // Layers run outermost-last: the token is validated before the admin check.
    let elevated = elevated_routes()
        .route_layer(from_fn(require_admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let router = Router::new()
        .merge(public_routes())
        .merge(protected)
        .merge(elevated)
        .fallback(fallback)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security));

    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/auth/register", post(public::auth_register))
        .route("/api/auth/login", post(public::auth_login))
}

fn protected_routes() -> Router<AppState> {
    use axum::routing::{delete, patch};

    Router::new()
        // Account
        .route("/api/auth/me", get(protected::auth_me))
        .route("/api/auth/password", put(protected::auth_password))
        // Tutors
        .route("/api/tutors", get(protected::tutor_list))
        .route("/api/tutors/me", put(protected::tutor_update_me))
        .route("/api/tutors/:id", get(protected::tutor_get))
        // Verification paperwork
        .route("/api/documents", post(protected::document_create).get(protected::document_list))
        // Sessions
        .route("/api/sessions", post(protected::session_book).get(protected::session_list))
        .route("/api/sessions/:id", get(protected::session_get))
        .route("/api/sessions/:id/cancel", post(protected::session_cancel))
        .route("/api/sessions/:id/complete", post(protected::session_complete))
        .route("/api/sessions/:id/review", post(protected::session_review))
        // Payments and disputes
        .route("/api/payments", post(protected::payment_create).get(protected::payment_list))
        .route("/api/disputes", post(protected::dispute_create).get(protected::dispute_list))
        // Exams
        .route("/api/exams", post(protected::exam_create).get(protected::exam_list))
        .route("/api/exams/:id", get(protected::exam_get))
        .route("/api/exams/:id/publish", post(protected::exam_publish))
        .route("/api/exams/:id/submissions", post(protected::submission_create).get(protected::submission_list))
        .route("/api/submissions/:id/grade", post(protected::submission_grade))
        // Messages
        .route("/api/messages", post(protected::message_send).get(protected::message_list))
        .route("/api/messages/:id/read", post(protected::message_read))
        // Planner
        .route("/api/planner", post(protected::planner_create).get(protected::planner_list))
        .route("/api/planner/:id", patch(protected::planner_update).delete(protected::planner_delete))
        // Coupons
        .route("/api/coupons/:code", get(protected::coupon_check))
        // Notifications
        .route("/api/notifications", get(protected::notification_list))
        .route("/api/notifications/read-all", post(protected::notification_read_all))
        .route("/api/notifications/:id/read", post(protected::notification_read))
}

fn elevated_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(elevated::user_list))
        .route("/api/admin/users/:id/suspend", post(elevated::user_suspend))
        .route("/api/admin/users/:id/activate", post(elevated::user_activate))
        .route("/api/admin/tutors", get(elevated::tutor_list))
        .route("/api/admin/tutors/:id/approve", post(elevated::tutor_approve))
        .route("/api/admin/tutors/:id/reject", post(elevated::tutor_reject))
        .route("/api/admin/documents/:id/verify", post(elevated::document_verify))
        .route("/api/admin/documents/:id/reject", post(elevated::document_reject))
        .route("/api/admin/payments/export", get(elevated::payment_export))
        .route("/api/admin/payments/:id/refund", post(elevated::payment_refund))
        .route("/api/admin/disputes/:id/resolve", post(elevated::dispute_resolve))
        .route("/api/admin/coupons", post(elevated::coupon_create).get(elevated::coupon_list))
        .route("/api/admin/coupons/:id/deactivate", post(elevated::coupon_deactivate))
        .route("/api/admin/analytics/overview", get(elevated::analytics_overview))
        .route("/api/admin/activity", get(elevated::activity_list))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origin = if security.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = security
            .cors_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Tutor Market API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "public": "/api/auth/register, /api/auth/login",
                "protected": "/api/* (bearer token)",
                "admin": "/api/admin/* (admin bearer token)",
                "health": "/health"
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}

async fn fallback() -> ApiError {
    ApiError::not_found("Route not found")
}
