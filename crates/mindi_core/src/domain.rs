//! crates/mindi_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Only the report document types carry serde derives, because a report's
//! content is persisted as a JSON document.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

/// Subscription tier of a user. Premium tiers receive the automated weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubscriptionTier {
    #[default]
    Standard,
    Plus,
    Premium,
    PremiumPlus,
}

impl SubscriptionTier {
    /// Tiers eligible for the scheduled weekly care report.
    pub const PREMIUM: [SubscriptionTier; 2] = [SubscriptionTier::Premium, SubscriptionTier::PremiumPlus];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Standard => "standard",
            SubscriptionTier::Plus => "plus",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::PremiumPlus => "premium_plus",
        }
    }

    pub fn is_premium(&self) -> bool {
        Self::PREMIUM.contains(self)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subscription type '{0}'")]
pub struct UnknownTier(pub String);

impl FromStr for SubscriptionTier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(SubscriptionTier::Standard),
            "plus" => Ok(SubscriptionTier::Plus),
            "premium" => Ok(SubscriptionTier::Premium),
            "premium_plus" => Ok(SubscriptionTier::PremiumPlus),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_day: Option<i32>,
    pub education: Option<String>,
    pub subscription: SubscriptionTier,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Age in full years on `date`, if the birth year is known.
    /// A missing month/day counts as the first of that month/year.
    pub fn age_on(&self, date: NaiveDate) -> Option<i32> {
        let year = self.birth_year?;
        let month = self.birth_month.unwrap_or(1) as u32;
        let day = self.birth_day.unwrap_or(1) as u32;
        let mut age = date.year() - year;
        if (date.month(), date.day()) < (month, day) {
            age -= 1;
        }
        Some(age.max(0))
    }
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

/// Fields accepted at signup. The password hash is passed separately.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub phone: String,
    pub email: Option<String>,
    pub name: String,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_day: Option<i32>,
    pub education: Option<String>,
    pub subscription: SubscriptionTier,
}

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub birth_day: Option<i32>,
    pub education: Option<String>,
}

//=========================================================================================
// Care conversations
//=========================================================================================

/// One persisted turn of user/AI dialogue.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub conversation_id: String,
    pub conversation_date: NaiveDate,
    pub user_question: String,
    pub ai_reply: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConversationLog {
    pub user_id: Uuid,
    pub conversation_id: String,
    pub conversation_date: NaiveDate,
    pub user_question: String,
    pub ai_reply: String,
}

/// All of one user's turns for a single calendar day, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DayConversations {
    pub date: NaiveDate,
    pub conversations: Vec<ConversationLog>,
}

/// Model scores recorded for a user on one day. Unique per (user, date).
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCareScore {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub acoustic_vit: i32,
    pub acoustic_lgbm: i32,
    pub language_bert: i32,
    pub language_gpt: i32,
}

/// One turn returned by the AI server's conversational endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub transcript: String,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub summary: String,
    pub topics: Vec<String>,
    pub tone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayStatus {
    pub date: NaiveDate,
    pub conversation_count: usize,
    pub completed: bool,
}

/// Care participation over one Monday-Sunday week.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyStatus {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<DayStatus>,
    pub completed_days: usize,
    pub completion_rate: f64,
}

impl WeeklyStatus {
    /// Builds the status from day buckets; a day counts as completed when it
    /// holds at least one conversation turn.
    pub fn from_buckets(week: ReportPeriod, buckets: &[DayConversations]) -> Self {
        let days: Vec<DayStatus> = buckets
            .iter()
            .map(|b| DayStatus {
                date: b.date,
                conversation_count: b.conversations.len(),
                completed: !b.conversations.is_empty(),
            })
            .collect();
        let completed_days = days.iter().filter(|d| d.completed).count();

        Self {
            week_start: week.start_date,
            week_end: week.end_date,
            days,
            completed_days,
            completion_rate: completed_days as f64 / 7.0,
        }
    }
}

//=========================================================================================
// Diagnosis
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Normal,
    Mild,
    Severe,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::Mild => "mild",
            RiskLevel::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown risk level '{0}'")]
pub struct UnknownRiskLevel(pub String);

impl FromStr for RiskLevel {
    type Err = UnknownRiskLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(RiskLevel::Normal),
            "mild" => Ok(RiskLevel::Mild),
            "severe" => Ok(RiskLevel::Severe),
            other => Err(UnknownRiskLevel(other.to_string())),
        }
    }
}

/// Final aggregation of a diagnosis session, as scored by the AI server.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisOutcome {
    pub total_score: f64,
    pub language_score: f64,
    pub acoustic_score: f64,
    pub check_score: f64,
    pub dementia: bool,
    pub risk_level: RiskLevel,
    pub threshold: i32,
    pub detailed_analysis: Option<String>,
}

/// One completed diagnostic session with a snapshot of the user's age and education.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisLog {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Uuid,
    pub diagnosis_date: NaiveDate,
    pub outcome: DiagnosisOutcome,
    pub user_age: i32,
    pub user_education: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDiagnosisLog {
    pub session_id: String,
    pub user_id: Uuid,
    pub diagnosis_date: NaiveDate,
    pub outcome: DiagnosisOutcome,
    pub user_age: i32,
    pub user_education: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisStatistics {
    pub total_diagnoses: usize,
    pub average_score: f64,
    pub dementia_count: usize,
    pub normal_count: usize,
    pub latest_diagnosis_date: Option<NaiveDate>,
}

impl DiagnosisStatistics {
    pub fn from_logs(logs: &[DiagnosisLog]) -> Self {
        if logs.is_empty() {
            return Self {
                total_diagnoses: 0,
                average_score: 0.0,
                dementia_count: 0,
                normal_count: 0,
                latest_diagnosis_date: None,
            };
        }

        let total = logs.len();
        let sum: f64 = logs.iter().map(|l| l.outcome.total_score).sum();
        let dementia_count = logs.iter().filter(|l| l.outcome.dementia).count();
        let average = (sum / total as f64 * 100.0).round() / 100.0;

        Self {
            total_diagnoses: total,
            average_score: average,
            dementia_count,
            normal_count: total - dementia_count,
            latest_diagnosis_date: logs.iter().map(|l| l.diagnosis_date).max(),
        }
    }
}

//=========================================================================================
// Reports
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Care,
    Diagnosis,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Care => "care",
            ReportKind::Diagnosis => "diagnosis",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported report type '{0}'")]
pub struct UnknownReportKind(pub String);

impl FromStr for ReportKind {
    type Err = UnknownReportKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "care" => Ok(ReportKind::Care),
            "diagnosis" => Ok(ReportKind::Diagnosis),
            other => Err(UnknownReportKind(other.to_string())),
        }
    }
}

/// Inclusive date range a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Report body as returned by the generator, before it is wrapped with its period.
#[derive(Debug, Clone, PartialEq)]
pub struct CareReportDraft {
    pub report_html: String,
    pub report_text: String,
    pub weekly_data: serde_json::Value,
    pub overall_comment: String,
    pub care_recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareReport {
    pub report_html: String,
    pub report_text: String,
    pub weekly_data: serde_json::Value,
    pub overall_comment: String,
    pub care_recommendations: Vec<String>,
    pub period: ReportPeriod,
    pub conversation_count: usize,
}

impl CareReport {
    pub fn from_draft(draft: CareReportDraft, period: ReportPeriod, conversation_count: usize) -> Self {
        Self {
            report_html: draft.report_html,
            report_text: draft.report_text,
            weekly_data: draft.weekly_data,
            overall_comment: draft.overall_comment,
            care_recommendations: draft.care_recommendations,
            period,
            conversation_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisScores {
    pub acoustic_score_vit: f64,
    pub acoustic_score_lgbm: f64,
    pub language_score_bert: f64,
    pub language_score_gpt: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisReportDraft {
    pub report_html: String,
    pub report_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub report_html: String,
    pub report_text: String,
    pub scores: DiagnosisScores,
}

/// Stored report document, tagged by report type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "report_type", content = "report_data", rename_all = "snake_case")]
pub enum ReportContent {
    Care(CareReport),
    Diagnosis(DiagnosisReport),
}

impl ReportContent {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportContent::Care(_) => ReportKind::Care,
            ReportContent::Diagnosis(_) => ReportKind::Diagnosis,
        }
    }
}

/// A generated report and its delivery status.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: ReportContent,
    pub generated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub email_sent: bool,
}

//=========================================================================================
// Email
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A single outgoing message: HTML body, optional plain-text alternative and attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_born(year: i32, month: i32, day: i32) -> User {
        User {
            id: Uuid::new_v4(),
            phone: "010-0000-0000".into(),
            email: None,
            name: "Kim".into(),
            gender: None,
            birth_year: Some(year),
            birth_month: Some(month),
            birth_day: Some(day),
            education: None,
            subscription: SubscriptionTier::Standard,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn tier_parsing_and_premium_set() {
        assert_eq!("premium_plus".parse::<SubscriptionTier>(), Ok(SubscriptionTier::PremiumPlus));
        assert!("gold".parse::<SubscriptionTier>().is_err());
        assert!(SubscriptionTier::Premium.is_premium());
        assert!(SubscriptionTier::PremiumPlus.is_premium());
        assert!(!SubscriptionTier::Plus.is_premium());
        assert!(!SubscriptionTier::Standard.is_premium());
    }

    #[test]
    fn age_counts_only_passed_birthdays() {
        let user = user_born(1950, 6, 15);
        assert_eq!(user.age_on(date("2024-06-14")), Some(73));
        assert_eq!(user.age_on(date("2024-06-15")), Some(74));

        let mut unknown = user.clone();
        unknown.birth_year = None;
        assert_eq!(unknown.age_on(date("2024-06-15")), None);
    }

    #[test]
    fn report_content_is_tagged_by_type() {
        let content = ReportContent::Diagnosis(DiagnosisReport {
            report_html: "<p>ok</p>".into(),
            report_text: "ok".into(),
            scores: DiagnosisScores {
                acoustic_score_vit: 1.0,
                acoustic_score_lgbm: 2.0,
                language_score_bert: 3.0,
                language_score_gpt: 4.0,
            },
        });

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["report_type"], "diagnosis");
        assert_eq!(json["report_data"]["scores"]["language_score_gpt"], 4.0);

        let back: ReportContent = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ReportKind::Diagnosis);
    }

    #[test]
    fn statistics_round_average_to_two_places() {
        let outcome = |score: f64, dementia: bool| DiagnosisOutcome {
            total_score: score,
            language_score: 0.0,
            acoustic_score: 0.0,
            check_score: 0.0,
            dementia,
            risk_level: RiskLevel::Normal,
            threshold: 50,
            detailed_analysis: None,
        };
        let log = |d: &str, score: f64, dementia: bool| DiagnosisLog {
            id: Uuid::new_v4(),
            session_id: "s".into(),
            user_id: Uuid::nil(),
            diagnosis_date: date(d),
            outcome: outcome(score, dementia),
            user_age: 70,
            user_education: "high_school".into(),
            created_at: Utc::now(),
        };

        let stats = DiagnosisStatistics::from_logs(&[
            log("2024-06-01", 10.0, false),
            log("2024-06-03", 20.0, true),
            log("2024-06-02", 11.0, false),
        ]);
        assert_eq!(stats.total_diagnoses, 3);
        assert_eq!(stats.average_score, 13.67);
        assert_eq!(stats.dementia_count, 1);
        assert_eq!(stats.normal_count, 2);
        assert_eq!(stats.latest_diagnosis_date, Some(date("2024-06-03")));

        assert_eq!(DiagnosisStatistics::from_logs(&[]).total_diagnoses, 0);
    }
}
