//! services/api/src/web/care.rs
//!
//! Daily care endpoints: voice chat turns, conversation logs, weekly
//! participation, greeting, daily summary, speech synthesis and daily scores.

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use bytes::Bytes;
use chrono::{DateTime, Local, NaiveDate, Utc};
use mindi_core::calendar::{bucket_by_day, week_containing};
use mindi_core::domain::{ConversationLog, DailyCareScore, DayStatus, NewConversationLog, User, WeeklyStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::adapters::tts::MAX_SPEECH_CHARS;
use crate::error::{ApiError, ApiResult};
use crate::web::date_or_today;
use crate::web::state::AppState;

/// Width of the `conversation_id` column.
pub const MAX_CONVERSATION_ID_LEN: usize = 36;

fn validate_conversation_id(id: &str) -> ApiResult<()> {
    if id.is_empty() {
        return Err(ApiError::Validation("conversation_id is required".to_string()));
    }
    if id.chars().count() > MAX_CONVERSATION_ID_LEN {
        return Err(ApiError::Validation(format!(
            "conversation_id must be at most {MAX_CONVERSATION_ID_LEN} characters"
        )));
    }
    Ok(())
}

/// Shown when the AI server cannot produce a personalized greeting.
pub fn fallback_greeting(name: &str) -> String {
    format!("안녕하세요, {name}님! 오늘 하루는 어떠셨나요?")
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConversationLogResponse {
    pub id: Uuid,
    pub conversation_id: String,
    pub conversation_date: NaiveDate,
    pub user_question: String,
    pub ai_reply: String,
    pub created_at: DateTime<Utc>,
}

impl From<ConversationLog> for ConversationLogResponse {
    fn from(log: ConversationLog) -> Self {
        Self {
            id: log.id,
            conversation_id: log.conversation_id,
            conversation_date: log.conversation_date,
            user_question: log.user_question,
            ai_reply: log.ai_reply,
            created_at: log.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLogRequest {
    pub conversation_id: String,
    pub user_question: String,
    pub ai_reply: String,
    /// `YYYY-MM-DD`; defaults to today.
    pub conversation_date: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct DateQuery {
    /// `YYYY-MM-DD`; defaults to today.
    pub date: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct RangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DayStatusResponse {
    pub date: NaiveDate,
    pub conversation_count: usize,
    pub completed: bool,
}

impl From<DayStatus> for DayStatusResponse {
    fn from(day: DayStatus) -> Self {
        Self {
            date: day.date,
            conversation_count: day.conversation_count,
            completed: day.completed,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct WeeklyStatusResponse {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<DayStatusResponse>,
    pub completed_days: usize,
    pub completion_rate: f64,
}

impl From<WeeklyStatus> for WeeklyStatusResponse {
    fn from(status: WeeklyStatus) -> Self {
        Self {
            week_start: status.week_start,
            week_end: status.week_end,
            days: status.days.into_iter().map(Into::into).collect(),
            completed_days: status.completed_days,
            completion_rate: status.completion_rate,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct GreetingResponse {
    pub greeting: String,
    pub last_conversation_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SummaryResponse {
    pub date: NaiveDate,
    pub summary: String,
    pub topics: Vec<String>,
    pub tone: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TtsRequest {
    pub text: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct DailyScorePayload {
    pub date: NaiveDate,
    pub acoustic_vit: i32,
    pub acoustic_lgbm: i32,
    pub language_bert: i32,
    pub language_gpt: i32,
}

impl From<DailyCareScore> for DailyScorePayload {
    fn from(score: DailyCareScore) -> Self {
        Self {
            date: score.date,
            acoustic_vit: score.acoustic_vit,
            acoustic_lgbm: score.acoustic_lgbm,
            language_bert: score.language_bert,
            language_gpt: score.language_gpt,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Forward one spoken turn to the AI server and store the resulting exchange.
///
/// Multipart fields: `audio` (file) and `conversation_id` (text).
#[utoipa::path(
    post,
    path = "/api/care/chat",
    request_body(content_type = "multipart/form-data", description = "`audio` file and `conversation_id`."),
    responses(
        (status = 200, description = "The stored turn", body = ConversationLogResponse),
        (status = 400, description = "Missing audio, or missing or overlong conversation id"),
        (status = 500, description = "AI server failure")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> ApiResult<Json<ConversationLogResponse>> {
    let mut audio: Option<(String, Bytes)> = None;
    let mut conversation_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read multipart data: {e}")))?
    {
        match field.name() {
            Some("audio") => {
                let file_name = field.file_name().unwrap_or("audio.webm").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Failed to read audio: {e}")))?;
                audio = Some((file_name, data));
            }
            Some("conversation_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Failed to read conversation_id: {e}")))?;
                conversation_id = Some(text.trim().to_string());
            }
            _ => {}
        }
    }

    let (file_name, data) = audio
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| ApiError::Validation("Multipart form must include an audio file".to_string()))?;
    let conversation_id = conversation_id.unwrap_or_default();
    validate_conversation_id(&conversation_id)?;

    let turn = state
        .care_ai
        .chat_turn(&user, &conversation_id, &file_name, data)
        .await?;

    let log = state
        .db
        .save_conversation_log(NewConversationLog {
            user_id: user.id,
            conversation_id,
            conversation_date: Local::now().date_naive(),
            user_question: turn.transcript,
            ai_reply: turn.reply,
        })
        .await?;
    Ok(Json(log.into()))
}

#[utoipa::path(
    post,
    path = "/api/care/logs",
    request_body = CreateLogRequest,
    responses(
        (status = 200, description = "The stored turn", body = ConversationLogResponse),
        (status = 400, description = "Invalid date or conversation id")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn create_log_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateLogRequest>,
) -> ApiResult<Json<ConversationLogResponse>> {
    validate_conversation_id(&req.conversation_id)?;
    let conversation_date = date_or_today(req.conversation_date.as_deref())?;
    let log = state
        .db
        .save_conversation_log(NewConversationLog {
            user_id: user.id,
            conversation_id: req.conversation_id,
            conversation_date,
            user_question: req.user_question,
            ai_reply: req.ai_reply,
        })
        .await?;
    Ok(Json(log.into()))
}

#[utoipa::path(
    get,
    path = "/api/care/logs",
    params(DateQuery),
    responses(
        (status = 200, description = "That day's turns, oldest first", body = [ConversationLogResponse]),
        (status = 400, description = "Invalid date")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn list_logs_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<Vec<ConversationLogResponse>>> {
    let date = date_or_today(query.date.as_deref())?;
    let logs = state.db.get_daily_conversations(user.id, date).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}

/// Participation over the Monday-Sunday week containing `date`.
#[utoipa::path(
    get,
    path = "/api/care/weekly-status",
    params(DateQuery),
    responses(
        (status = 200, description = "Per-day completion", body = WeeklyStatusResponse),
        (status = 400, description = "Invalid date")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn weekly_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<WeeklyStatusResponse>> {
    let date = date_or_today(query.date.as_deref())?;
    let week = week_containing(date);
    let logs = state
        .db
        .get_conversations_between(user.id, week.start_date, week.end_date)
        .await?;
    let buckets = bucket_by_day(user.id, week.start_date, week.end_date, logs);
    Ok(Json(WeeklyStatus::from_buckets(week, &buckets).into()))
}

#[utoipa::path(
    get,
    path = "/api/care/greeting",
    responses(
        (status = 200, description = "Personalized or fallback greeting", body = GreetingResponse)
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn greeting_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<GreetingResponse> {
    let last_conversation_date = match state.db.get_last_conversation(user.id).await {
        Ok(last) => last.map(|log| log.conversation_date),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Could not load last conversation");
            None
        }
    };

    let greeting = match state.care_ai.greeting(&user, last_conversation_date).await {
        Ok(greeting) => greeting,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Greeting service unavailable; using fallback");
            fallback_greeting(&user.name)
        }
    };

    Json(GreetingResponse {
        greeting,
        last_conversation_date,
    })
}

#[utoipa::path(
    get,
    path = "/api/care/summary",
    params(DateQuery),
    responses(
        (status = 200, description = "AI summary of that day", body = SummaryResponse),
        (status = 404, description = "No conversations that day"),
        (status = 500, description = "AI server failure")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let date = date_or_today(query.date.as_deref())?;
    let logs = state.db.get_daily_conversations(user.id, date).await?;
    if logs.is_empty() {
        return Err(ApiError::NotFound(format!("No conversations on {date}")));
    }

    let summary = state.care_ai.summarize_day(&user, date, &logs).await?;
    Ok(Json(SummaryResponse {
        date,
        summary: summary.summary,
        topics: summary.topics,
        tone: summary.tone,
    }))
}

/// Synthesize speech for `text`, returned as MP3.
#[utoipa::path(
    post,
    path = "/api/care/tts",
    request_body = TtsRequest,
    responses(
        (status = 200, description = "MP3 audio", content_type = "audio/mpeg"),
        (status = 400, description = "Empty or overlong text"),
        (status = 500, description = "TTS provider failure")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn tts_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TtsRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }
    if req.text.chars().count() > MAX_SPEECH_CHARS {
        return Err(ApiError::Validation(format!(
            "text must be at most {MAX_SPEECH_CHARS} characters"
        )));
    }
    let audio = state.tts_adapter.generate_audio(&req.text).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

#[utoipa::path(
    put,
    path = "/api/care/daily-scores",
    request_body = DailyScorePayload,
    responses(
        (status = 200, description = "Stored score", body = DailyScorePayload)
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn upsert_daily_score_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<DailyScorePayload>,
) -> ApiResult<Json<DailyScorePayload>> {
    let stored = state
        .db
        .upsert_daily_score(DailyCareScore {
            user_id: user.id,
            date: req.date,
            acoustic_vit: req.acoustic_vit,
            acoustic_lgbm: req.acoustic_lgbm,
            language_bert: req.language_bert,
            language_gpt: req.language_gpt,
        })
        .await?;
    info!(user_id = %user.id, date = %stored.date, "Daily care score stored");
    Ok(Json(stored.into()))
}

/// Scores within `[start, end]`; both default to the current week's bounds.
#[utoipa::path(
    get,
    path = "/api/care/daily-scores",
    params(RangeQuery),
    responses(
        (status = 200, description = "Scores, oldest first", body = [DailyScorePayload]),
        (status = 400, description = "Invalid range")
    ),
    security(("bearer" = [])),
    tag = "Care"
)]
pub async fn list_daily_scores_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<DailyScorePayload>>> {
    let week = week_containing(Local::now().date_naive());
    let start = match query.start.as_deref() {
        Some(s) => date_or_today(Some(s))?,
        None => week.start_date,
    };
    let end = match query.end.as_deref() {
        Some(s) => date_or_today(Some(s))?,
        None => week.end_date,
    };
    if start > end {
        return Err(ApiError::Validation(format!(
            "start date {start} is after end date {end}"
        )));
    }
    let scores = state.db.get_daily_scores(user.id, start, end).await?;
    Ok(Json(scores.into_iter().map(Into::into).collect()))
}
