//! crates/mindi_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    CareReportDraft, ChatTurn, ConversationLog, DailyCareScore, DailySummary, DayConversations,
    DiagnosisLog, DiagnosisOutcome, DiagnosisReportDraft, DiagnosisScores, NewConversationLog,
    NewDiagnosisLog, NewUser, OutgoingEmail, ProfileUpdate, ReportContent, ReportKind, ReportLog,
    ReportPeriod, SubscriptionTier, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// `Conflict` message for a signup with an already registered phone number.
pub const PHONE_TAKEN: &str = "Phone number is already registered";

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    /// Fails with `Conflict` when the phone number is already registered.
    async fn create_user(&self, new_user: NewUser, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_phone(&self, phone: &str) -> PortResult<User>;

    async fn get_credentials_by_phone(&self, phone: &str) -> PortResult<UserCredentials>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User>;

    async fn update_subscription(&self, user_id: Uuid, tier: SubscriptionTier) -> PortResult<User>;

    async fn list_users_by_tiers(&self, tiers: &[SubscriptionTier]) -> PortResult<Vec<User>>;

    // --- Conversation Logs ---
    async fn save_conversation_log(&self, log: NewConversationLog) -> PortResult<ConversationLog>;

    /// The user's logs dated within `[start, end]`, ordered by date then creation time.
    async fn get_conversations_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<ConversationLog>>;

    async fn get_daily_conversations(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> PortResult<Vec<ConversationLog>> {
        self.get_conversations_between(user_id, date, date).await
    }

    async fn get_last_conversation(&self, user_id: Uuid) -> PortResult<Option<ConversationLog>>;

    // --- Daily Care Scores ---
    /// Inserts or replaces the score for `(user, date)`.
    async fn upsert_daily_score(&self, score: DailyCareScore) -> PortResult<DailyCareScore>;

    async fn get_daily_scores(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<DailyCareScore>>;

    // --- Diagnosis Logs ---
    async fn save_diagnosis_log(&self, log: NewDiagnosisLog) -> PortResult<DiagnosisLog>;

    async fn get_diagnosis_log(&self, diagnosis_id: Uuid) -> PortResult<DiagnosisLog>;

    async fn get_diagnosis_log_by_session(&self, session_id: &str) -> PortResult<DiagnosisLog>;

    /// Newest first. `limit = None` returns every log.
    async fn get_diagnosis_history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> PortResult<Vec<DiagnosisLog>>;

    // --- Report Logs ---
    /// Stores a freshly generated report with `email_sent = false`.
    async fn create_report_log(&self, user_id: Uuid, content: &ReportContent) -> PortResult<ReportLog>;

    async fn get_report_log(&self, report_id: Uuid) -> PortResult<ReportLog>;

    async fn list_report_logs(&self, user_id: Uuid, skip: i64, limit: i64) -> PortResult<Vec<ReportLog>>;

    /// Reports of one kind generated at or after `since`, newest first.
    async fn list_recent_reports(
        &self,
        user_id: Uuid,
        kind: ReportKind,
        since: DateTime<Utc>,
    ) -> PortResult<Vec<ReportLog>>;

    async fn mark_report_sent(&self, report_id: Uuid, sent_at: DateTime<Utc>) -> PortResult<()>;
}

#[async_trait]
pub trait ReportGenerationService: Send + Sync {
    /// Generates the weekly care report from a week of day buckets.
    async fn generate_care_report(
        &self,
        user: &User,
        period: &ReportPeriod,
        weekly_conversations: &[DayConversations],
    ) -> PortResult<CareReportDraft>;

    async fn generate_diagnosis_report(
        &self,
        user: &User,
        scores: &DiagnosisScores,
    ) -> PortResult<DiagnosisReportDraft>;
}

#[async_trait]
pub trait CareAssistantService: Send + Sync {
    /// Transcribes the user's audio and produces the assistant's reply.
    async fn chat_turn(
        &self,
        user: &User,
        conversation_id: &str,
        file_name: &str,
        audio: Bytes,
    ) -> PortResult<ChatTurn>;

    async fn greeting(&self, user: &User, last_conversation: Option<NaiveDate>) -> PortResult<String>;

    async fn summarize_day(
        &self,
        user: &User,
        date: NaiveDate,
        conversations: &[ConversationLog],
    ) -> PortResult<DailySummary>;

    /// Aggregates a finished diagnosis session into its final scores.
    async fn finalize_diagnosis(&self, user: &User, session_id: &str) -> PortResult<DiagnosisOutcome>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates audio data from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Hands one message to the mail relay. Success means the relay accepted it.
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()>;
}
