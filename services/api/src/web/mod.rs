pub mod auth;
pub mod care;
pub mod diagnosis;
pub mod middleware;
pub mod report;
pub mod rest;
pub mod state;
pub mod user;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use chrono::{Local, NaiveDate};
use mindi_core::calendar::parse_date;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::{ApiError, ApiResult};
use state::AppState;

/// Parses an optional `YYYY-MM-DD` query value, defaulting to today (server-local).
pub(crate) fn date_or_today(value: Option<&str>) -> ApiResult<NaiveDate> {
    match value {
        None | Some("") => Ok(Local::now().date_naive()),
        Some(v) => parse_date(v)
            .map_err(|_| ApiError::Validation(format!("Invalid date '{v}', expected YYYY-MM-DD"))),
    }
}

/// Builds the full `/api` router with authentication and CORS applied.
pub fn router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = state.config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {e}", state.config.cors_origin))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/user/signup", post(auth::signup_handler))
        .route("/user/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/validate", post(auth::validate_handler))
        .route(
            "/user/me",
            get(user::get_me_handler).patch(user::update_me_handler),
        )
        .route("/user/me/subscription", put(user::update_subscription_handler))
        .route("/care/chat", post(care::chat_handler))
        .route(
            "/care/logs",
            get(care::list_logs_handler).post(care::create_log_handler),
        )
        .route("/care/weekly-status", get(care::weekly_status_handler))
        .route("/care/greeting", get(care::greeting_handler))
        .route("/care/summary", get(care::summary_handler))
        .route("/care/tts", post(care::tts_handler))
        .route(
            "/care/daily-scores",
            get(care::list_daily_scores_handler).put(care::upsert_daily_score_handler),
        )
        .route("/diagnosis/submit", post(diagnosis::submit_handler))
        .route("/diagnosis/logs", get(diagnosis::list_logs_handler))
        .route("/diagnosis/logs/{diagnosis_id}", get(diagnosis::get_log_handler))
        .route("/diagnosis/latest", get(diagnosis::latest_handler))
        .route("/diagnosis/sessions/{session_id}", get(diagnosis::session_handler))
        .route("/diagnosis/statistics", get(diagnosis::statistics_handler))
        .route("/report/generate-care", post(report::generate_care_handler))
        .route("/report/generate-diagnosis", post(report::generate_diagnosis_handler))
        .route("/report/history", get(report::history_handler))
        .route("/report/{report_id}", get(report::detail_handler))
        .route("/report/scheduler/start", post(report::scheduler_start_handler))
        .route("/report/scheduler/stop", post(report::scheduler_stop_handler))
        .route("/report/scheduler/status", get(report::scheduler_status_handler))
        .route(
            "/report/scheduler/generate-weekly",
            post(report::generate_weekly_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(state);

    Ok(Router::new().nest("/api", api))
}
