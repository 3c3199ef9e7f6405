//! services/api/src/adapters/ai_server.rs
//!
//! HTTP client for the external AI inference server. It implements both the
//! `ReportGenerationService` and the `CareAssistantService` ports.
//!
//! The server's scoring and generation are opaque; this adapter only shapes
//! the JSON it expects and maps its answers back into domain types. Any
//! non-2xx status, timeout or undecodable body becomes `PortError::Unexpected`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use mindi_core::calendar::DATE_FORMAT;
use mindi_core::domain::{
    CareReportDraft, ChatTurn, ConversationLog, DailySummary, DayConversations, DiagnosisOutcome,
    DiagnosisReportDraft, DiagnosisScores, ReportPeriod, RiskLevel, User,
};
use mindi_core::ports::{CareAssistantService, PortError, PortResult, ReportGenerationService};
use reqwest::multipart::{Form, Part};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// Client for the AI server, sharing one connection pool across all calls.
#[derive(Clone)]
pub struct AiServerClient {
    http: reqwest::Client,
    base_url: String,
    diagnosis_timeout: Duration,
}

impl AiServerClient {
    /// `timeout` applies to every call except the diagnosis finalization,
    /// which gets `diagnosis_timeout`.
    pub fn new(base_url: &str, timeout: Duration, diagnosis_timeout: Duration) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build AI server client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            diagnosis_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        timeout: Option<Duration>,
    ) -> PortResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(|e| call_failed(path, e))?;
        decode(path, response).await
    }
}

fn call_failed(path: &str, e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Unexpected(format!("AI server call {path} timed out"))
    } else {
        PortError::Unexpected(format!("AI server call {path} failed: {e}"))
    }
}

async fn decode<Resp: DeserializeOwned>(path: &str, response: reqwest::Response) -> PortResult<Resp> {
    let status = response.status();
    if !status.is_success() {
        return Err(PortError::Unexpected(format!(
            "AI server call {path} returned {status}"
        )));
    }
    debug!(path, %status, "AI server responded");
    response
        .json::<Resp>()
        .await
        .map_err(|e| PortError::Unexpected(format!("AI server call {path} returned a malformed body: {e}")))
}

//=========================================================================================
// Wire Payloads
//=========================================================================================

#[derive(Serialize)]
struct WireConversation<'a> {
    user_question: &'a str,
    ai_reply: &'a str,
    conversation_id: &'a str,
    created_at: String,
}

impl<'a> From<&'a ConversationLog> for WireConversation<'a> {
    fn from(log: &'a ConversationLog) -> Self {
        Self {
            user_question: &log.user_question,
            ai_reply: &log.ai_reply,
            conversation_id: &log.conversation_id,
            created_at: log.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
struct WireDay<'a> {
    date: String,
    conversations: Vec<WireConversation<'a>>,
}

#[derive(Serialize)]
struct CareReportRequest<'a> {
    user_id: Uuid,
    start_date: String,
    end_date: String,
    user_email: Option<&'a str>,
    user_name: &'a str,
    weekly_conversations: Vec<WireDay<'a>>,
}

#[derive(Deserialize)]
struct CareReportResponse {
    report_html: String,
    report_text: String,
    weekly_data: serde_json::Value,
    overall_comment: String,
    care_recommendations: Vec<String>,
}

#[derive(Serialize)]
struct DiagnosisReportRequest<'a> {
    user_id: Uuid,
    user_name: &'a str,
    user_email: Option<&'a str>,
    #[serde(flatten)]
    scores: &'a DiagnosisScores,
}

#[derive(Deserialize)]
struct DiagnosisReportResponse {
    report_html: String,
    report_text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    transcript: String,
    reply: String,
}

#[derive(Serialize)]
struct GreetingRequest<'a> {
    user_id: Uuid,
    user_name: &'a str,
    last_conversation_date: Option<String>,
}

#[derive(Deserialize)]
struct GreetingResponse {
    greeting: String,
}

#[derive(Serialize)]
struct SummaryTurn<'a> {
    user_question: &'a str,
    ai_reply: &'a str,
}

#[derive(Serialize)]
struct SummaryRequest<'a> {
    user_id: Uuid,
    user_name: &'a str,
    date: String,
    conversations: Vec<SummaryTurn<'a>>,
}

#[derive(Deserialize)]
struct SummaryResponse {
    summary: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    tone: String,
}

#[derive(Serialize)]
struct FinalizeRequest<'a> {
    session_id: &'a str,
    user_id: Uuid,
    user_age: Option<i32>,
    user_education: Option<&'a str>,
}

#[derive(Deserialize)]
struct FinalizeResponse {
    total_score: f64,
    language_score: f64,
    acoustic_score: f64,
    check_score: f64,
    /// 0 or 1
    dementia_result: i32,
    risk_level: String,
    threshold: i32,
    #[serde(default)]
    detailed_analysis: Option<String>,
}

impl FinalizeResponse {
    fn to_domain(self) -> PortResult<DiagnosisOutcome> {
        let risk_level = self
            .risk_level
            .parse::<RiskLevel>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(DiagnosisOutcome {
            total_score: self.total_score,
            language_score: self.language_score,
            acoustic_score: self.acoustic_score,
            check_score: self.check_score,
            dementia: self.dementia_result != 0,
            risk_level,
            threshold: self.threshold,
            detailed_analysis: self.detailed_analysis,
        })
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl ReportGenerationService for AiServerClient {
    async fn generate_care_report(
        &self,
        user: &User,
        period: &ReportPeriod,
        weekly_conversations: &[DayConversations],
    ) -> PortResult<CareReportDraft> {
        let request = CareReportRequest {
            user_id: user.id,
            start_date: period.start_date.format(DATE_FORMAT).to_string(),
            end_date: period.end_date.format(DATE_FORMAT).to_string(),
            user_email: user.email.as_deref(),
            user_name: &user.name,
            weekly_conversations: weekly_conversations
                .iter()
                .map(|day| WireDay {
                    date: day.date.format(DATE_FORMAT).to_string(),
                    conversations: day.conversations.iter().map(WireConversation::from).collect(),
                })
                .collect(),
        };

        let response: CareReportResponse =
            self.post_json("/generate-care-report", &request, None).await?;
        Ok(CareReportDraft {
            report_html: response.report_html,
            report_text: response.report_text,
            weekly_data: response.weekly_data,
            overall_comment: response.overall_comment,
            care_recommendations: response.care_recommendations,
        })
    }

    async fn generate_diagnosis_report(
        &self,
        user: &User,
        scores: &DiagnosisScores,
    ) -> PortResult<DiagnosisReportDraft> {
        let request = DiagnosisReportRequest {
            user_id: user.id,
            user_name: &user.name,
            user_email: user.email.as_deref(),
            scores,
        };
        let response: DiagnosisReportResponse = self
            .post_json("/generate-diagnosis-report", &request, None)
            .await?;
        Ok(DiagnosisReportDraft {
            report_html: response.report_html,
            report_text: response.report_text,
        })
    }
}

#[async_trait]
impl CareAssistantService for AiServerClient {
    async fn chat_turn(
        &self,
        user: &User,
        conversation_id: &str,
        file_name: &str,
        audio: Bytes,
    ) -> PortResult<ChatTurn> {
        let path = "/care/chat";
        let audio_part = Part::bytes(audio.to_vec()).file_name(file_name.to_string());
        let form = Form::new()
            .text("user_id", user.id.to_string())
            .text("conversation_id", conversation_id.to_string())
            .part("audio", audio_part);

        let response = self
            .http
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(|e| call_failed(path, e))?;
        let chat: ChatResponse = decode(path, response).await?;
        Ok(ChatTurn {
            transcript: chat.transcript,
            reply: chat.reply,
        })
    }

    async fn greeting(&self, user: &User, last_conversation: Option<NaiveDate>) -> PortResult<String> {
        let request = GreetingRequest {
            user_id: user.id,
            user_name: &user.name,
            last_conversation_date: last_conversation.map(|d| d.format(DATE_FORMAT).to_string()),
        };
        let response: GreetingResponse = self.post_json("/care/greeting", &request, None).await?;
        Ok(response.greeting)
    }

    async fn summarize_day(
        &self,
        user: &User,
        date: NaiveDate,
        conversations: &[ConversationLog],
    ) -> PortResult<DailySummary> {
        let request = SummaryRequest {
            user_id: user.id,
            user_name: &user.name,
            date: date.format(DATE_FORMAT).to_string(),
            conversations: conversations
                .iter()
                .map(|c| SummaryTurn {
                    user_question: &c.user_question,
                    ai_reply: &c.ai_reply,
                })
                .collect(),
        };
        let response: SummaryResponse = self.post_json("/care/daily-summary", &request, None).await?;
        Ok(DailySummary {
            summary: response.summary,
            topics: response.topics,
            tone: response.tone,
        })
    }

    async fn finalize_diagnosis(&self, user: &User, session_id: &str) -> PortResult<DiagnosisOutcome> {
        let request = FinalizeRequest {
            session_id,
            user_id: user.id,
            user_age: user.age_on(chrono::Local::now().date_naive()),
            user_education: user.education.as_deref(),
        };
        let response: FinalizeResponse = self
            .post_json("/diagnosis/finalize", &request, Some(self.diagnosis_timeout))
            .await?;
        response.to_domain()
    }
}
