//! services/api/src/web/report.rs
//!
//! Report generation, history and scheduler control endpoints.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mindi_core::calendar::parse_date;
use mindi_core::domain::{DiagnosisScores, ReportContent, ReportKind, ReportLog, ReportPeriod, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::report::SchedulerStatus;
use crate::web::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CareReportRequest {
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
}

#[derive(Deserialize, ToSchema)]
pub struct DiagnosisReportRequest {
    pub acoustic_score_vit: f64,
    pub acoustic_score_lgbm: f64,
    #[serde(alias = "language_score_BERT")]
    pub language_score_bert: f64,
    pub language_score_gpt: f64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReportCreatedResponse {
    pub message: String,
    pub report_id: Uuid,
    pub email_sent: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// `care` or `diagnosis`. When given, only that type from the last 30 days.
    pub report_type: Option<String>,
    pub skip: Option<i64>,
    /// Defaults to 10.
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReportLogResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub report_type: String,
    #[schema(value_type = Object)]
    pub report_data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub email_sent: bool,
}

impl TryFrom<ReportLog> for ReportLogResponse {
    type Error = ApiError;

    fn try_from(log: ReportLog) -> Result<Self, Self::Error> {
        let report_data = match &log.content {
            ReportContent::Care(report) => serde_json::to_value(report),
            ReportContent::Diagnosis(report) => serde_json::to_value(report),
        }
        .map_err(|e| ApiError::Internal(format!("Failed to encode report {}: {e}", log.id)))?;

        Ok(Self {
            id: log.id,
            user_id: log.user_id,
            report_type: log.content.kind().as_str().to_string(),
            report_data,
            generated_at: log.generated_at,
            sent_at: log.sent_at,
            email_sent: log.email_sent,
        })
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ManualReportRequest {
    pub user_id: Uuid,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub id: String,
    pub name: String,
    pub next_run_time: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SchedulerStatusResponse {
    pub is_running: bool,
    pub job_count: usize,
    pub jobs: Vec<JobStatusResponse>,
}

impl From<SchedulerStatus> for SchedulerStatusResponse {
    fn from(status: SchedulerStatus) -> Self {
        Self {
            is_running: status.is_running,
            job_count: status.job_count,
            jobs: status
                .jobs
                .into_iter()
                .map(|job| JobStatusResponse {
                    id: job.id,
                    name: job.name,
                    next_run_time: job.next_run_time,
                })
                .collect(),
        }
    }
}

fn period_from(start: &str, end: &str) -> ApiResult<ReportPeriod> {
    let parse = |value: &str| {
        parse_date(value).map_err(|_| {
            ApiError::Validation(format!("Invalid date '{value}', expected YYYY-MM-DD"))
        })
    };
    let period = ReportPeriod {
        start_date: parse(start)?,
        end_date: parse(end)?,
    };
    if period.start_date > period.end_date {
        return Err(ApiError::Validation(format!(
            "start date {} is after end date {}",
            period.start_date, period.end_date
        )));
    }
    Ok(period)
}

//=========================================================================================
// Report Handlers
//=========================================================================================

/// Generate and store a care report for the caller without emailing it.
#[utoipa::path(
    post,
    path = "/api/report/generate-care",
    request_body = CareReportRequest,
    responses(
        (status = 200, description = "Report stored", body = ReportCreatedResponse),
        (status = 400, description = "Invalid period"),
        (status = 500, description = "AI server failure")
    ),
    security(("bearer" = [])),
    tag = "Report"
)]
pub async fn generate_care_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CareReportRequest>,
) -> ApiResult<Json<ReportCreatedResponse>> {
    let period = period_from(&req.start_date, &req.end_date)?;
    let (report_id, _) = state.reports.generate_care_for(&user, period).await?;
    info!(user_id = %user.id, %report_id, "On-demand care report stored");
    Ok(Json(ReportCreatedResponse {
        message: "Care report generated".to_string(),
        report_id,
        email_sent: false,
    }))
}

/// Generate a diagnosis report from the four sub-scores, emailing it when the
/// caller has an address.
#[utoipa::path(
    post,
    path = "/api/report/generate-diagnosis",
    request_body = DiagnosisReportRequest,
    responses(
        (status = 200, description = "Report stored", body = ReportCreatedResponse),
        (status = 500, description = "AI server failure")
    ),
    security(("bearer" = [])),
    tag = "Report"
)]
pub async fn generate_diagnosis_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<DiagnosisReportRequest>,
) -> ApiResult<Json<ReportCreatedResponse>> {
    let scores = DiagnosisScores {
        acoustic_score_vit: req.acoustic_score_vit,
        acoustic_score_lgbm: req.acoustic_score_lgbm,
        language_score_bert: req.language_score_bert,
        language_score_gpt: req.language_score_gpt,
    };
    let log = state.reports.generate_diagnosis_report(&user, scores).await?;
    Ok(Json(ReportCreatedResponse {
        message: "Diagnosis report generated".to_string(),
        report_id: log.id,
        email_sent: log.email_sent,
    }))
}

#[utoipa::path(
    get,
    path = "/api/report/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Newest first", body = [ReportLogResponse]),
        (status = 400, description = "Unknown report type")
    ),
    security(("bearer" = [])),
    tag = "Report"
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<ReportLogResponse>>> {
    let kind = query
        .report_type
        .as_deref()
        .map(str::parse::<ReportKind>)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let skip = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if limit < 1 {
        return Err(ApiError::Validation("limit must be positive".to_string()));
    }

    let logs = state.reports.report_history(user.id, kind, skip, limit).await?;
    let reports = logs
        .into_iter()
        .map(ReportLogResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(reports))
}

#[utoipa::path(
    get,
    path = "/api/report/{report_id}",
    params(("report_id" = Uuid, Path, description = "Report log id")),
    responses(
        (status = 200, description = "The report", body = ReportLogResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "No such report")
    ),
    security(("bearer" = [])),
    tag = "Report"
)]
pub async fn detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Json<ReportLogResponse>> {
    let log = state.db.get_report_log(report_id).await?;
    if log.user_id != user.id {
        return Err(ApiError::Forbidden(
            "Not allowed to access this report".to_string(),
        ));
    }
    Ok(Json(log.try_into()?))
}

//=========================================================================================
// Scheduler Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/api/report/scheduler/start",
    responses((status = 200, description = "Scheduler running", body = MessageResponse)),
    security(("bearer" = [])),
    tag = "Scheduler"
)]
pub async fn scheduler_start_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<MessageResponse> {
    let message = if state.scheduler.start() {
        info!(user_id = %user.id, "Scheduler started on request");
        "Scheduler started"
    } else {
        "Scheduler is already running"
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/api/report/scheduler/stop",
    responses((status = 200, description = "Scheduler stopped", body = MessageResponse)),
    security(("bearer" = [])),
    tag = "Scheduler"
)]
pub async fn scheduler_stop_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<MessageResponse> {
    let message = if state.scheduler.stop() {
        info!(user_id = %user.id, "Scheduler stopped on request");
        "Scheduler stopped"
    } else {
        "Scheduler is not running"
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/report/scheduler/status",
    responses((status = 200, description = "Scheduler state", body = SchedulerStatusResponse)),
    security(("bearer" = [])),
    tag = "Scheduler"
)]
pub async fn scheduler_status_handler(State(state): State<Arc<AppState>>) -> Json<SchedulerStatusResponse> {
    Json(state.scheduler.status().into())
}

/// Run the weekly pipeline, email included, for one user and period now.
#[utoipa::path(
    post,
    path = "/api/report/scheduler/generate-weekly",
    request_body = ManualReportRequest,
    responses(
        (status = 200, description = "Report stored; emailed when the user has an address", body = MessageResponse),
        (status = 400, description = "Invalid date"),
        (status = 500, description = "Report generation failed")
    ),
    security(("bearer" = [])),
    tag = "Scheduler"
)]
pub async fn generate_weekly_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ManualReportRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let period = period_from(&req.start_date, &req.end_date)?;
    let delivered = state
        .reports
        .run_manual_report(req.user_id, period.start_date, period.end_date)
        .await;
    if !delivered {
        return Err(ApiError::Internal("Report generation failed".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Weekly care report generated".to_string(),
    }))
}
