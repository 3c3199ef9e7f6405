//! In-memory fakes of every port plus helpers to build the real router on top of them.

#![allow(dead_code)]

use api_lib::auth::password::hash_password;
use api_lib::auth::TokenService;
use api_lib::config::Config;
use api_lib::report::{ReportScheduler, ReportWorkflow};
use api_lib::web::{self, state::AppState};
use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use http_body_util::BodyExt;
use mindi_core::domain::*;
use mindi_core::ports::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret-key-0123456789";

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    conversations: Vec<ConversationLog>,
    scores: Vec<DailyCareScore>,
    diagnoses: Vec<DiagnosisLog>,
    reports: Vec<ReportLog>,
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, phone: &str, password: &str, tier: SubscriptionTier, email: Option<&str>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
            name: format!("user-{phone}"),
            gender: None,
            birth_year: Some(1950),
            birth_month: Some(3),
            birth_day: Some(1),
            education: Some("high_school".into()),
            subscription: tier,
            is_active: true,
            created_at: Utc::now(),
        };
        let hash = hash_password(password).unwrap();
        self.tables.lock().unwrap().users.push((user.clone(), hash));
        user
    }

    pub fn add_log(&self, user_id: Uuid, day: &str, created_at: DateTime<Utc>, question: &str) -> ConversationLog {
        let log = ConversationLog {
            id: Uuid::new_v4(),
            user_id,
            conversation_id: "conv-1".into(),
            conversation_date: date(day),
            user_question: question.to_string(),
            ai_reply: format!("reply to {question}"),
            created_at,
        };
        self.tables.lock().unwrap().conversations.push(log.clone());
        log
    }

    pub fn add_diagnosis(&self, user_id: Uuid, session_id: &str, day: &str, score: f64, dementia: bool) -> DiagnosisLog {
        let log = DiagnosisLog {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            user_id,
            diagnosis_date: date(day),
            outcome: DiagnosisOutcome {
                total_score: score,
                language_score: score / 2.0,
                acoustic_score: score / 2.0,
                check_score: 0.0,
                dementia,
                risk_level: if dementia { RiskLevel::Mild } else { RiskLevel::Normal },
                threshold: 50,
                detailed_analysis: None,
            },
            user_age: 74,
            user_education: "high_school".into(),
            created_at: date(day).and_hms_opt(12, 0, 0).unwrap().and_utc(),
        };
        self.tables.lock().unwrap().diagnoses.push(log.clone());
        log
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn reports(&self) -> Vec<ReportLog> {
        self.tables.lock().unwrap().reports.clone()
    }

    pub fn diagnoses(&self) -> Vec<DiagnosisLog> {
        self.tables.lock().unwrap().diagnoses.clone()
    }

    pub fn conversations(&self) -> Vec<ConversationLog> {
        self.tables.lock().unwrap().conversations.clone()
    }

    pub fn insert_report(&self, user_id: Uuid, content: ReportContent, generated_at: DateTime<Utc>) -> ReportLog {
        let log = ReportLog {
            id: Uuid::new_v4(),
            user_id,
            content,
            generated_at,
            sent_at: None,
            email_sent: false,
        };
        self.tables.lock().unwrap().reports.push(log.clone());
        log
    }
}

fn not_found(what: impl std::fmt::Display) -> PortError {
    PortError::NotFound(what.to_string())
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(&self, new_user: NewUser, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|(u, _)| u.phone == new_user.phone) {
            return Err(PortError::Conflict(PHONE_TAKEN.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            phone: new_user.phone,
            email: new_user.email,
            name: new_user.name,
            gender: new_user.gender,
            birth_year: new_user.birth_year,
            birth_month: new_user.birth_month,
            birth_day: new_user.birth_day,
            education: new_user.education,
            subscription: new_user.subscription,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.users.push((user.clone(), hashed_password.to_string()));
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|(u, _)| u.id == user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| not_found(user_id))
    }

    async fn get_user_by_phone(&self, phone: &str) -> PortResult<User> {
        Ok(self.get_credentials_by_phone(phone).await?.user)
    }

    async fn get_credentials_by_phone(&self, phone: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().unwrap();
        tables
            .users
            .iter()
            .find(|(u, _)| u.phone == phone)
            .map(|(u, h)| UserCredentials {
                user: u.clone(),
                hashed_password: h.clone(),
            })
            .ok_or_else(|| not_found(phone))
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        let (user, _) = tables
            .users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or_else(|| not_found(user_id))?;
        if let Some(v) = update.email {
            user.email = Some(v);
        }
        if let Some(v) = update.name {
            user.name = v;
        }
        if let Some(v) = update.gender {
            user.gender = Some(v);
        }
        if let Some(v) = update.birth_year {
            user.birth_year = Some(v);
        }
        if let Some(v) = update.birth_month {
            user.birth_month = Some(v);
        }
        if let Some(v) = update.birth_day {
            user.birth_day = Some(v);
        }
        if let Some(v) = update.education {
            user.education = Some(v);
        }
        Ok(user.clone())
    }

    async fn update_subscription(&self, user_id: Uuid, tier: SubscriptionTier) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        let (user, _) = tables
            .users
            .iter_mut()
            .find(|(u, _)| u.id == user_id)
            .ok_or_else(|| not_found(user_id))?;
        user.subscription = tier;
        Ok(user.clone())
    }

    async fn list_users_by_tiers(&self, tiers: &[SubscriptionTier]) -> PortResult<Vec<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .filter(|(u, _)| tiers.contains(&u.subscription))
            .map(|(u, _)| u.clone())
            .collect())
    }

    async fn save_conversation_log(&self, log: NewConversationLog) -> PortResult<ConversationLog> {
        let stored = ConversationLog {
            id: Uuid::new_v4(),
            user_id: log.user_id,
            conversation_id: log.conversation_id,
            conversation_date: log.conversation_date,
            user_question: log.user_question,
            ai_reply: log.ai_reply,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().conversations.push(stored.clone());
        Ok(stored)
    }

    async fn get_conversations_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<ConversationLog>> {
        let tables = self.tables.lock().unwrap();
        let mut logs: Vec<ConversationLog> = tables
            .conversations
            .iter()
            .filter(|l| l.user_id == user_id && l.conversation_date >= start && l.conversation_date <= end)
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.conversation_date, l.created_at));
        Ok(logs)
    }

    async fn get_last_conversation(&self, user_id: Uuid) -> PortResult<Option<ConversationLog>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .conversations
            .iter()
            .filter(|l| l.user_id == user_id)
            .max_by_key(|l| l.created_at)
            .cloned())
    }

    async fn upsert_daily_score(&self, score: DailyCareScore) -> PortResult<DailyCareScore> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .scores
            .retain(|s| !(s.user_id == score.user_id && s.date == score.date));
        tables.scores.push(score.clone());
        Ok(score)
    }

    async fn get_daily_scores(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<DailyCareScore>> {
        let tables = self.tables.lock().unwrap();
        let mut scores: Vec<DailyCareScore> = tables
            .scores
            .iter()
            .filter(|s| s.user_id == user_id && s.date >= start && s.date <= end)
            .cloned()
            .collect();
        scores.sort_by_key(|s| s.date);
        Ok(scores)
    }

    async fn save_diagnosis_log(&self, log: NewDiagnosisLog) -> PortResult<DiagnosisLog> {
        let stored = DiagnosisLog {
            id: Uuid::new_v4(),
            session_id: log.session_id,
            user_id: log.user_id,
            diagnosis_date: log.diagnosis_date,
            outcome: log.outcome,
            user_age: log.user_age,
            user_education: log.user_education,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().diagnoses.push(stored.clone());
        Ok(stored)
    }

    async fn get_diagnosis_log(&self, diagnosis_id: Uuid) -> PortResult<DiagnosisLog> {
        let tables = self.tables.lock().unwrap();
        tables
            .diagnoses
            .iter()
            .find(|d| d.id == diagnosis_id)
            .cloned()
            .ok_or_else(|| not_found(diagnosis_id))
    }

    async fn get_diagnosis_log_by_session(&self, session_id: &str) -> PortResult<DiagnosisLog> {
        let tables = self.tables.lock().unwrap();
        tables
            .diagnoses
            .iter()
            .filter(|d| d.session_id == session_id)
            .max_by_key(|d| d.created_at)
            .cloned()
            .ok_or_else(|| not_found(session_id))
    }

    async fn get_diagnosis_history(&self, user_id: Uuid, limit: Option<i64>) -> PortResult<Vec<DiagnosisLog>> {
        let tables = self.tables.lock().unwrap();
        let mut logs: Vec<DiagnosisLog> = tables
            .diagnoses
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            logs.truncate(limit as usize);
        }
        Ok(logs)
    }

    async fn create_report_log(&self, user_id: Uuid, content: &ReportContent) -> PortResult<ReportLog> {
        Ok(self.insert_report(user_id, content.clone(), Utc::now()))
    }

    async fn get_report_log(&self, report_id: Uuid) -> PortResult<ReportLog> {
        let tables = self.tables.lock().unwrap();
        tables
            .reports
            .iter()
            .find(|r| r.id == report_id)
            .cloned()
            .ok_or_else(|| not_found(report_id))
    }

    async fn list_report_logs(&self, user_id: Uuid, skip: i64, limit: i64) -> PortResult<Vec<ReportLog>> {
        let tables = self.tables.lock().unwrap();
        let mut logs: Vec<ReportLog> = tables
            .reports
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(logs
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_recent_reports(
        &self,
        user_id: Uuid,
        kind: ReportKind,
        since: DateTime<Utc>,
    ) -> PortResult<Vec<ReportLog>> {
        let tables = self.tables.lock().unwrap();
        let mut logs: Vec<ReportLog> = tables
            .reports
            .iter()
            .filter(|r| r.user_id == user_id && r.content.kind() == kind && r.generated_at >= since)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(logs)
    }

    async fn mark_report_sent(&self, report_id: Uuid, sent_at: DateTime<Utc>) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let report = tables
            .reports
            .iter_mut()
            .find(|r| r.id == report_id)
            .ok_or_else(|| not_found(report_id))?;
        report.email_sent = true;
        report.sent_at = Some(sent_at);
        Ok(())
    }
}

//=========================================================================================
// AI server
//=========================================================================================

/// Records every care report request; fails for users listed in `fail_for`.
#[derive(Default)]
pub struct FakeAi {
    pub care_calls: Mutex<Vec<(Uuid, ReportPeriod, Vec<DayConversations>)>>,
    pub fail_for: Mutex<HashSet<Uuid>>,
    pub greeting_down: AtomicBool,
    pub outcomes: Mutex<HashMap<String, DiagnosisOutcome>>,
}

impl FakeAi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, user_id: Uuid) {
        self.fail_for.lock().unwrap().insert(user_id);
    }

    pub fn care_calls(&self) -> Vec<(Uuid, ReportPeriod, Vec<DayConversations>)> {
        self.care_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportGenerationService for FakeAi {
    async fn generate_care_report(
        &self,
        user: &User,
        period: &ReportPeriod,
        weekly_conversations: &[DayConversations],
    ) -> PortResult<CareReportDraft> {
        self.care_calls
            .lock()
            .unwrap()
            .push((user.id, *period, weekly_conversations.to_vec()));
        if self.fail_for.lock().unwrap().contains(&user.id) {
            return Err(PortError::Unexpected("AI server returned 500".into()));
        }
        Ok(CareReportDraft {
            report_html: "<p>weekly</p>".into(),
            report_text: "weekly".into(),
            weekly_data: serde_json::json!({ "days": weekly_conversations.len() }),
            overall_comment: "steady week".into(),
            care_recommendations: vec!["keep talking".into()],
        })
    }

    async fn generate_diagnosis_report(
        &self,
        _user: &User,
        scores: &DiagnosisScores,
    ) -> PortResult<DiagnosisReportDraft> {
        Ok(DiagnosisReportDraft {
            report_html: format!("<p>{}</p>", scores.language_score_gpt),
            report_text: "diagnosis".into(),
        })
    }
}

#[async_trait]
impl CareAssistantService for FakeAi {
    async fn chat_turn(
        &self,
        _user: &User,
        _conversation_id: &str,
        _file_name: &str,
        audio: Bytes,
    ) -> PortResult<ChatTurn> {
        Ok(ChatTurn {
            transcript: format!("heard {} bytes", audio.len()),
            reply: "nice to hear from you".into(),
        })
    }

    async fn greeting(&self, user: &User, _last: Option<NaiveDate>) -> PortResult<String> {
        if self.greeting_down.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("connection refused".into()));
        }
        Ok(format!("Welcome back, {}", user.name))
    }

    async fn summarize_day(
        &self,
        _user: &User,
        _date: NaiveDate,
        conversations: &[ConversationLog],
    ) -> PortResult<DailySummary> {
        Ok(DailySummary {
            summary: format!("{} turns", conversations.len()),
            topics: vec!["walk".into()],
            tone: "calm".into(),
        })
    }

    async fn finalize_diagnosis(&self, _user: &User, session_id: &str) -> PortResult<DiagnosisOutcome> {
        self.outcomes
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| PortError::Unexpected(format!("unknown session {session_id}")))
    }
}

//=========================================================================================
// Email & TTS
//=========================================================================================

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub down: AtomicBool,
}

impl FakeMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for FakeMailer {
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("relay unavailable".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct FakeTts;

#[async_trait]
impl TextToSpeechService for FakeTts {
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        Ok(format!("mp3:{text}").into_bytes())
    }
}

//=========================================================================================
// Application wiring
//=========================================================================================

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://unused"),
        ("SECRET_KEY", SECRET),
        ("SCHEDULER_ENABLED", "false"),
    ]);
    Config::from_lookup(move |key: &str| vars.get(key).map(|v| v.to_string())).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDb>,
    pub ai: Arc<FakeAi>,
    pub mailer: Arc<FakeMailer>,
}

pub fn workflow(db: &Arc<InMemoryDb>, ai: &Arc<FakeAi>, mailer: &Arc<FakeMailer>) -> Arc<ReportWorkflow> {
    Arc::new(ReportWorkflow::new(db.clone(), ai.clone(), mailer.clone()).unwrap())
}

pub fn test_app() -> TestApp {
    let config = Arc::new(test_config());
    let db = InMemoryDb::new();
    let ai = FakeAi::new();
    let mailer = FakeMailer::new();
    let reports = workflow(&db, &ai, &mailer);
    let scheduler = Arc::new(ReportScheduler::new(reports.clone(), config.report_schedule));

    let state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        tokens: TokenService::new(&config.secret_key, config.access_token_ttl),
        tts_adapter: Arc::new(FakeTts),
        care_ai: ai.clone(),
        reports,
        scheduler,
    });
    let router = web::router(state.clone()).unwrap();

    TestApp {
        router,
        state,
        db,
        ai,
        mailer,
    }
}

impl TestApp {
    pub fn access_token(&self, user: &User) -> String {
        self.state.tokens.issue_access(&user.phone).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (axum::http::StatusCode, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    pub async fn send_json(&self, request: Request<Body>) -> (axum::http::StatusCode, serde_json::Value) {
        let (status, body) = self.send(request).await;
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub const BOUNDARY: &str = "mindi-test-boundary";

/// `multipart/form-data` request with an optional `audio` file part and text fields.
pub fn multipart_request(uri: &str, token: &str, audio: Option<&[u8]>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"turn.webm\"\r\n\
                 Content-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}
