//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mindi_core::domain::{
    ConversationLog, DailyCareScore, DiagnosisLog, DiagnosisOutcome, NewConversationLog,
    NewDiagnosisLog, NewUser, ProfileUpdate, ReportContent, ReportKind, ReportLog, RiskLevel,
    SubscriptionTier, User, UserCredentials,
};
use mindi_core::ports::{DatabaseService, PortError, PortResult, PHONE_TAKEN};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, phone, email, name, gender, birth_year, birth_month, birth_day, \
     education, subscription_type, is_active, created_at";

const CONVERSATION_COLUMNS: &str =
    "id, user_id, conversation_id, conversation_date, user_question, ai_reply, created_at";

const DIAGNOSIS_COLUMNS: &str = "id, session_id, user_id, diagnosis_date, total_score, \
     language_score, acoustic_score, check_score, dementia_result, risk_level, threshold, \
     detailed_analysis, user_age, user_education, created_at";

const REPORT_COLUMNS: &str = "id, user_id, report_data, generated_at, sent_at, email_sent";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    phone: String,
    email: Option<String>,
    name: String,
    gender: Option<String>,
    birth_year: Option<i32>,
    birth_month: Option<i32>,
    birth_day: Option<i32>,
    education: Option<String>,
    subscription_type: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let subscription = self
            .subscription_type
            .parse::<SubscriptionTier>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(User {
            id: self.id,
            phone: self.phone,
            email: self.email,
            name: self.name,
            gender: self.gender,
            birth_year: self.birth_year,
            birth_month: self.birth_month,
            birth_day: self.birth_day,
            education: self.education,
            subscription,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    hashed_password: String,
}

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    user_id: Uuid,
    conversation_id: String,
    conversation_date: NaiveDate,
    user_question: String,
    ai_reply: String,
    created_at: DateTime<Utc>,
}
impl ConversationRecord {
    fn to_domain(self) -> ConversationLog {
        ConversationLog {
            id: self.id,
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            conversation_date: self.conversation_date,
            user_question: self.user_question,
            ai_reply: self.ai_reply,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DailyScoreRecord {
    user_id: Uuid,
    date: NaiveDate,
    acoustic_vit: i32,
    acoustic_lgbm: i32,
    language_bert: i32,
    language_gpt: i32,
}
impl DailyScoreRecord {
    fn to_domain(self) -> DailyCareScore {
        DailyCareScore {
            user_id: self.user_id,
            date: self.date,
            acoustic_vit: self.acoustic_vit,
            acoustic_lgbm: self.acoustic_lgbm,
            language_bert: self.language_bert,
            language_gpt: self.language_gpt,
        }
    }
}

#[derive(FromRow)]
struct DiagnosisRecord {
    id: Uuid,
    session_id: String,
    user_id: Uuid,
    diagnosis_date: NaiveDate,
    total_score: f64,
    language_score: f64,
    acoustic_score: f64,
    check_score: f64,
    dementia_result: bool,
    risk_level: String,
    threshold: i32,
    detailed_analysis: Option<String>,
    user_age: i32,
    user_education: String,
    created_at: DateTime<Utc>,
}
impl DiagnosisRecord {
    fn to_domain(self) -> PortResult<DiagnosisLog> {
        let risk_level = self
            .risk_level
            .parse::<RiskLevel>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(DiagnosisLog {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            diagnosis_date: self.diagnosis_date,
            outcome: DiagnosisOutcome {
                total_score: self.total_score,
                language_score: self.language_score,
                acoustic_score: self.acoustic_score,
                check_score: self.check_score,
                dementia: self.dementia_result,
                risk_level,
                threshold: self.threshold,
                detailed_analysis: self.detailed_analysis,
            },
            user_age: self.user_age,
            user_education: self.user_education,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ReportRecord {
    id: Uuid,
    user_id: Uuid,
    report_data: Json<ReportContent>,
    generated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    email_sent: bool,
}
impl ReportRecord {
    fn to_domain(self) -> ReportLog {
        ReportLog {
            id: self.id,
            user_id: self.user_id,
            content: self.report_data.0,
            generated_at: self.generated_at,
            sent_at: self.sent_at,
            email_sent: self.email_sent,
        }
    }
}

fn users_to_domain(records: Vec<UserRecord>) -> PortResult<Vec<User>> {
    records.into_iter().map(UserRecord::to_domain).collect()
}

fn diagnoses_to_domain(records: Vec<DiagnosisRecord>) -> PortResult<Vec<DiagnosisLog>> {
    records.into_iter().map(DiagnosisRecord::to_domain).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, new_user: NewUser, hashed_password: &str) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (id, phone, email, hashed_password, name, gender, birth_year, \
             birth_month, birth_day, education, subscription_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.phone)
            .bind(&new_user.email)
            .bind(hashed_password)
            .bind(&new_user.name)
            .bind(&new_user.gender)
            .bind(new_user.birth_year)
            .bind(new_user.birth_month)
            .bind(new_user.birth_day)
            .bind(&new_user.education)
            .bind(new_user.subscription.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    PortError::Conflict(PHONE_TAKEN.to_string())
                }
                other => unexpected(other),
            })?;
        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn get_user_by_phone(&self, phone: &str) -> PortResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User with phone {} not found", phone)))?
            .to_domain()
    }

    async fn get_credentials_by_phone(&self, phone: &str) -> PortResult<UserCredentials> {
        let sql = format!("SELECT {USER_COLUMNS}, hashed_password FROM users WHERE phone = $1");
        let record = sqlx::query_as::<_, CredentialsRecord>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User with phone {} not found", phone)))?;
        Ok(UserCredentials {
            user: record.user.to_domain()?,
            hashed_password: record.hashed_password,
        })
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET email = COALESCE($2, email), name = COALESCE($3, name), \
             gender = COALESCE($4, gender), birth_year = COALESCE($5, birth_year), \
             birth_month = COALESCE($6, birth_month), birth_day = COALESCE($7, birth_day), \
             education = COALESCE($8, education) WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .bind(update.email)
            .bind(update.name)
            .bind(update.gender)
            .bind(update.birth_year)
            .bind(update.birth_month)
            .bind(update.birth_day)
            .bind(update.education)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn update_subscription(&self, user_id: Uuid, tier: SubscriptionTier) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET subscription_type = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .bind(tier.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?
            .to_domain()
    }

    async fn list_users_by_tiers(&self, tiers: &[SubscriptionTier]) -> PortResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE subscription_type = ANY($1)");
        let names: Vec<String> = tiers.iter().map(|t| t.as_str().to_string()).collect();
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        users_to_domain(records)
    }

    async fn save_conversation_log(&self, log: NewConversationLog) -> PortResult<ConversationLog> {
        let sql = format!(
            "INSERT INTO conversation_logs (id, user_id, conversation_id, conversation_date, \
             user_question, ai_reply) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {CONVERSATION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ConversationRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(log.user_id)
            .bind(log.conversation_id)
            .bind(log.conversation_date)
            .bind(log.user_question)
            .bind(log.ai_reply)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_conversations_between(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<ConversationLog>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversation_logs \
             WHERE user_id = $1 AND conversation_date BETWEEN $2 AND $3 \
             ORDER BY conversation_date ASC, created_at ASC"
        );
        let records = sqlx::query_as::<_, ConversationRecord>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_last_conversation(&self, user_id: Uuid) -> PortResult<Option<ConversationLog>> {
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversation_logs WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let record = sqlx::query_as::<_, ConversationRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn upsert_daily_score(&self, score: DailyCareScore) -> PortResult<DailyCareScore> {
        let record = sqlx::query_as::<_, DailyScoreRecord>(
            "INSERT INTO care_daily_scores (user_id, date, acoustic_vit, acoustic_lgbm, \
             language_bert, language_gpt) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, date) DO UPDATE SET acoustic_vit = EXCLUDED.acoustic_vit, \
             acoustic_lgbm = EXCLUDED.acoustic_lgbm, language_bert = EXCLUDED.language_bert, \
             language_gpt = EXCLUDED.language_gpt \
             RETURNING user_id, date, acoustic_vit, acoustic_lgbm, language_bert, language_gpt",
        )
        .bind(score.user_id)
        .bind(score.date)
        .bind(score.acoustic_vit)
        .bind(score.acoustic_lgbm)
        .bind(score.language_bert)
        .bind(score.language_gpt)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_daily_scores(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<DailyCareScore>> {
        let records = sqlx::query_as::<_, DailyScoreRecord>(
            "SELECT user_id, date, acoustic_vit, acoustic_lgbm, language_bert, language_gpt \
             FROM care_daily_scores WHERE user_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date ASC",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_diagnosis_log(&self, log: NewDiagnosisLog) -> PortResult<DiagnosisLog> {
        let sql = format!(
            "INSERT INTO diagnosis_logs (id, session_id, user_id, diagnosis_date, total_score, \
             language_score, acoustic_score, check_score, dementia_result, risk_level, threshold, \
             detailed_analysis, user_age, user_education) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {DIAGNOSIS_COLUMNS}"
        );
        let outcome = log.outcome;
        sqlx::query_as::<_, DiagnosisRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(log.session_id)
            .bind(log.user_id)
            .bind(log.diagnosis_date)
            .bind(outcome.total_score)
            .bind(outcome.language_score)
            .bind(outcome.acoustic_score)
            .bind(outcome.check_score)
            .bind(outcome.dementia)
            .bind(outcome.risk_level.as_str())
            .bind(outcome.threshold)
            .bind(outcome.detailed_analysis)
            .bind(log.user_age)
            .bind(log.user_education)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?
            .to_domain()
    }

    async fn get_diagnosis_log(&self, diagnosis_id: Uuid) -> PortResult<DiagnosisLog> {
        let sql = format!("SELECT {DIAGNOSIS_COLUMNS} FROM diagnosis_logs WHERE id = $1");
        sqlx::query_as::<_, DiagnosisRecord>(&sql)
            .bind(diagnosis_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Diagnosis {} not found", diagnosis_id)))?
            .to_domain()
    }

    async fn get_diagnosis_log_by_session(&self, session_id: &str) -> PortResult<DiagnosisLog> {
        let sql = format!(
            "SELECT {DIAGNOSIS_COLUMNS} FROM diagnosis_logs WHERE session_id = $1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, DiagnosisRecord>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| {
                PortError::NotFound(format!("Diagnosis for session {} not found", session_id))
            })?
            .to_domain()
    }

    async fn get_diagnosis_history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> PortResult<Vec<DiagnosisLog>> {
        // LIMIT NULL means no limit in PostgreSQL.
        let sql = format!(
            "SELECT {DIAGNOSIS_COLUMNS} FROM diagnosis_logs WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        let records = sqlx::query_as::<_, DiagnosisRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        diagnoses_to_domain(records)
    }

    async fn create_report_log(&self, user_id: Uuid, content: &ReportContent) -> PortResult<ReportLog> {
        let sql = format!(
            "INSERT INTO report_logs (id, user_id, report_type, report_data) \
             VALUES ($1, $2, $3, $4) RETURNING {REPORT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ReportRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(content.kind().as_str())
            .bind(Json(content))
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_report_log(&self, report_id: Uuid) -> PortResult<ReportLog> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM report_logs WHERE id = $1");
        let record = sqlx::query_as::<_, ReportRecord>(&sql)
            .bind(report_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Report {} not found", report_id)))?;
        Ok(record.to_domain())
    }

    async fn list_report_logs(&self, user_id: Uuid, skip: i64, limit: i64) -> PortResult<Vec<ReportLog>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM report_logs WHERE user_id = $1 \
             ORDER BY generated_at DESC OFFSET $2 LIMIT $3"
        );
        let records = sqlx::query_as::<_, ReportRecord>(&sql)
            .bind(user_id)
            .bind(skip)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_recent_reports(
        &self,
        user_id: Uuid,
        kind: ReportKind,
        since: DateTime<Utc>,
    ) -> PortResult<Vec<ReportLog>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM report_logs \
             WHERE user_id = $1 AND report_type = $2 AND generated_at >= $3 \
             ORDER BY generated_at DESC"
        );
        let records = sqlx::query_as::<_, ReportRecord>(&sql)
            .bind(user_id)
            .bind(kind.as_str())
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn mark_report_sent(&self, report_id: Uuid, sent_at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query("UPDATE report_logs SET email_sent = TRUE, sent_at = $2 WHERE id = $1")
            .bind(report_id)
            .bind(sent_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Report {} not found", report_id)));
        }
        Ok(())
    }
}
