//! services/api/src/web/diagnosis.rs
//!
//! Diagnosis session submission and history endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use mindi_core::domain::{DiagnosisLog, DiagnosisStatistics, NewDiagnosisLog, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 10;

#[derive(Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub session_id: String,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Defaults to 10.
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DiagnosisLogResponse {
    pub id: Uuid,
    pub session_id: String,
    pub diagnosis_date: NaiveDate,
    pub total_score: f64,
    pub language_score: f64,
    pub acoustic_score: f64,
    pub check_score: f64,
    /// 1 when the session indicates dementia, otherwise 0.
    pub dementia_result: i32,
    pub risk_level: String,
    pub threshold: i32,
    pub detailed_analysis: Option<String>,
    pub user_age: i32,
    pub user_education: String,
    pub created_at: DateTime<Utc>,
}

impl From<DiagnosisLog> for DiagnosisLogResponse {
    fn from(log: DiagnosisLog) -> Self {
        Self {
            id: log.id,
            session_id: log.session_id,
            diagnosis_date: log.diagnosis_date,
            total_score: log.outcome.total_score,
            language_score: log.outcome.language_score,
            acoustic_score: log.outcome.acoustic_score,
            check_score: log.outcome.check_score,
            dementia_result: i32::from(log.outcome.dementia),
            risk_level: log.outcome.risk_level.as_str().to_string(),
            threshold: log.outcome.threshold,
            detailed_analysis: log.outcome.detailed_analysis,
            user_age: log.user_age,
            user_education: log.user_education,
            created_at: log.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct StatisticsResponse {
    pub total_diagnoses: usize,
    pub average_score: f64,
    pub dementia_count: usize,
    pub normal_count: usize,
    pub latest_diagnosis_date: Option<NaiveDate>,
}

impl From<DiagnosisStatistics> for StatisticsResponse {
    fn from(stats: DiagnosisStatistics) -> Self {
        Self {
            total_diagnoses: stats.total_diagnoses,
            average_score: stats.average_score,
            dementia_count: stats.dementia_count,
            normal_count: stats.normal_count,
            latest_diagnosis_date: stats.latest_diagnosis_date,
        }
    }
}

fn ensure_owner(log: &DiagnosisLog, user: &User) -> ApiResult<()> {
    if log.user_id != user.id {
        return Err(ApiError::Forbidden(
            "Not allowed to access this diagnosis".to_string(),
        ));
    }
    Ok(())
}

/// Finalize a diagnosis session on the AI server and store the outcome.
#[utoipa::path(
    post,
    path = "/api/diagnosis/submit",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Stored diagnosis", body = DiagnosisLogResponse),
        (status = 400, description = "Missing session id"),
        (status = 500, description = "AI server failure or timeout")
    ),
    security(("bearer" = [])),
    tag = "Diagnosis"
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<Json<DiagnosisLogResponse>> {
    let session_id = req.session_id.trim();
    if session_id.is_empty() {
        return Err(ApiError::Validation("session_id is required".to_string()));
    }

    let outcome = state.care_ai.finalize_diagnosis(&user, session_id).await?;

    let today = Local::now().date_naive();
    let log = state
        .db
        .save_diagnosis_log(NewDiagnosisLog {
            session_id: session_id.to_string(),
            user_id: user.id,
            diagnosis_date: today,
            outcome,
            user_age: user.age_on(today).unwrap_or_default(),
            user_education: user.education.clone().unwrap_or_default(),
        })
        .await?;
    info!(user_id = %user.id, diagnosis_id = %log.id, "Diagnosis stored");
    Ok(Json(log.into()))
}

#[utoipa::path(
    get,
    path = "/api/diagnosis/logs",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Newest first", body = [DiagnosisLogResponse])
    ),
    security(("bearer" = [])),
    tag = "Diagnosis"
)]
pub async fn list_logs_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<DiagnosisLogResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit < 1 {
        return Err(ApiError::Validation("limit must be positive".to_string()));
    }
    let logs = state.db.get_diagnosis_history(user.id, Some(limit)).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/diagnosis/logs/{diagnosis_id}",
    params(("diagnosis_id" = Uuid, Path, description = "Diagnosis log id")),
    responses(
        (status = 200, description = "The diagnosis", body = DiagnosisLogResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "No such diagnosis")
    ),
    security(("bearer" = [])),
    tag = "Diagnosis"
)]
pub async fn get_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(diagnosis_id): Path<Uuid>,
) -> ApiResult<Json<DiagnosisLogResponse>> {
    let log = state.db.get_diagnosis_log(diagnosis_id).await?;
    ensure_owner(&log, &user)?;
    Ok(Json(log.into()))
}

#[utoipa::path(
    get,
    path = "/api/diagnosis/latest",
    responses(
        (status = 200, description = "Most recent diagnosis", body = DiagnosisLogResponse),
        (status = 404, description = "No diagnoses yet")
    ),
    security(("bearer" = [])),
    tag = "Diagnosis"
)]
pub async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<DiagnosisLogResponse>> {
    let log = state
        .db
        .get_diagnosis_history(user.id, Some(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound("No diagnosis found".to_string()))?;
    Ok(Json(log.into()))
}

#[utoipa::path(
    get,
    path = "/api/diagnosis/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Diagnosis session id")),
    responses(
        (status = 200, description = "The session's diagnosis", body = DiagnosisLogResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "No such session")
    ),
    security(("bearer" = [])),
    tag = "Diagnosis"
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<DiagnosisLogResponse>> {
    let log = state.db.get_diagnosis_log_by_session(&session_id).await?;
    ensure_owner(&log, &user)?;
    Ok(Json(log.into()))
}

#[utoipa::path(
    get,
    path = "/api/diagnosis/statistics",
    responses(
        (status = 200, description = "Aggregate over all of the caller's diagnoses", body = StatisticsResponse)
    ),
    security(("bearer" = [])),
    tag = "Diagnosis"
)]
pub async fn statistics_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<StatisticsResponse>> {
    let logs = state.db.get_diagnosis_history(user.id, None).await?;
    Ok(Json(DiagnosisStatistics::from_logs(&logs).into()))
}
