//! services/api/src/report/workflow.rs
//!
//! The care report pipeline: select subscribers, collect a week of
//! conversations, ask the AI server for a report, persist it, email it and
//! record whether delivery succeeded.
//!
//! Each subscriber is processed independently. A failure at any step stops
//! that subscriber only and nothing already written is rolled back, so a
//! persisted report whose email failed stays in the log with
//! `email_sent = false`.

use crate::report::email_template::EmailTemplates;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use mindi_core::calendar::{bucket_by_day, previous_week, DATE_FORMAT};
use mindi_core::domain::{
    CareReport, CareReportDraft, DayConversations, DiagnosisReport, DiagnosisScores, ReportContent,
    ReportKind, ReportLog, ReportPeriod, SubscriptionTier, User,
};
use mindi_core::ports::{DatabaseService, EmailSender, PortError, PortResult, ReportGenerationService};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Window searched when report history is filtered by type.
pub const RECENT_REPORT_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("start date {start} is after end date {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type ReportResult<T> = Result<T, ReportError>;

fn has_address(user: &User) -> bool {
    user.email.as_deref().is_some_and(|e| !e.trim().is_empty())
}

/// Outcome counts of one scheduled cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub period: ReportPeriod,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded runs whose email was accepted by the relay.
    pub emailed: usize,
}

pub struct ReportWorkflow {
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn ReportGenerationService>,
    mailer: Arc<dyn EmailSender>,
    templates: EmailTemplates,
}

impl ReportWorkflow {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        generator: Arc<dyn ReportGenerationService>,
        mailer: Arc<dyn EmailSender>,
    ) -> PortResult<Self> {
        Ok(Self {
            db,
            generator,
            mailer,
            templates: EmailTemplates::new()?,
        })
    }

    /// Premium and premium-plus users who have an email address.
    pub async fn select_eligible_subscribers(&self) -> PortResult<Vec<User>> {
        let users = self.db.list_users_by_tiers(&SubscriptionTier::PREMIUM).await?;
        Ok(users
            .into_iter()
            .filter(has_address)
            .collect())
    }

    /// One bucket per day of `[start, end]`, ascending, empty days included.
    pub async fn collect_week(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReportResult<Vec<DayConversations>> {
        if start > end {
            return Err(ReportError::InvalidPeriod { start, end });
        }
        let logs = self.db.get_conversations_between(user_id, start, end).await?;
        Ok(bucket_by_day(user_id, start, end, logs))
    }

    pub async fn request_report(
        &self,
        user: &User,
        period: &ReportPeriod,
        weekly_conversations: &[DayConversations],
    ) -> PortResult<CareReportDraft> {
        self.generator
            .generate_care_report(user, period, weekly_conversations)
            .await
    }

    /// Stores the report unsent and returns its id.
    pub async fn persist_report(&self, user: &User, report: &CareReport) -> PortResult<Uuid> {
        let content = ReportContent::Care(report.clone());
        let log = self.db.create_report_log(user.id, &content).await?;
        Ok(log.id)
    }

    /// Renders and sends the weekly care email. Returns whether the relay accepted it.
    pub async fn send_report_email(&self, user: &User, report: &CareReport) -> bool {
        let email = match self.templates.care_email(user, report) {
            Ok(email) => email,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Could not prepare care report email");
                return false;
            }
        };
        match self.mailer.send(&email).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Care report email failed");
                false
            }
        }
    }

    /// Marks the report sent on success. A failed delivery leaves the row untouched.
    pub async fn record_outcome(
        &self,
        report_id: Uuid,
        success: bool,
        timestamp: DateTime<Utc>,
    ) -> PortResult<()> {
        if !success {
            warn!(%report_id, "Report email not delivered; leaving it unsent");
            return Ok(());
        }
        self.db.mark_report_sent(report_id, timestamp).await
    }

    /// Collects, generates and persists a care report without emailing it.
    pub async fn generate_care_for(&self, user: &User, period: ReportPeriod) -> ReportResult<(Uuid, CareReport)> {
        let weekly = self
            .collect_week(user.id, period.start_date, period.end_date)
            .await?;
        let conversation_count = weekly.iter().map(|d| d.conversations.len()).sum();
        let draft = self.request_report(user, &period, &weekly).await?;
        let report = CareReport::from_draft(draft, period, conversation_count);
        let report_id = self.persist_report(user, &report).await?;
        Ok((report_id, report))
    }

    /// The full per-subscriber pipeline. The run succeeds once the report is
    /// persisted; the returned flag says whether the email went out. Users
    /// without an address are not emailed.
    async fn process_subscriber(&self, user: &User, period: ReportPeriod) -> ReportResult<(Uuid, bool)> {
        let (report_id, report) = self.generate_care_for(user, period).await?;
        if !has_address(user) {
            info!(user_id = %user.id, %report_id, "No email address; care report stored only");
            return Ok((report_id, false));
        }

        let delivered = self.send_report_email(user, &report).await;
        if let Err(e) = self.record_outcome(report_id, delivered, Utc::now()).await {
            warn!(%report_id, error = %e, "Could not record care report delivery");
            return Ok((report_id, false));
        }
        Ok((report_id, delivered))
    }

    /// Reports on the Monday-Sunday week before `run_date` for every eligible
    /// subscriber, one at a time.
    pub async fn run_scheduled_report_cycle(&self, run_date: NaiveDate) -> PortResult<CycleSummary> {
        let period = previous_week(run_date);
        info!(
            start = %period.start_date.format(DATE_FORMAT),
            end = %period.end_date.format(DATE_FORMAT),
            "Starting weekly care report cycle"
        );

        let subscribers = self.select_eligible_subscribers().await?;
        if subscribers.is_empty() {
            info!("No eligible subscribers");
        }

        let mut summary = CycleSummary {
            period,
            succeeded: 0,
            failed: 0,
            emailed: 0,
        };
        for user in &subscribers {
            match self.process_subscriber(user, period).await {
                Ok((report_id, emailed)) => {
                    summary.succeeded += 1;
                    if emailed {
                        summary.emailed += 1;
                    }
                    info!(user_id = %user.id, %report_id, emailed, "Weekly care report stored");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(user_id = %user.id, error = %e, "Weekly care report failed");
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            emailed = summary.emailed,
            "Weekly care report cycle finished"
        );
        Ok(summary)
    }

    /// Runs the pipeline for one user and an explicit period. `true` once the
    /// report is stored, emailed or not. Never errors; failures before that
    /// point are logged and reported as `false`.
    pub async fn run_manual_report(&self, user_id: Uuid, start: NaiveDate, end: NaiveDate) -> bool {
        let user = match self.db.get_user_by_id(user_id).await {
            Ok(user) => user,
            Err(e) => {
                error!(%user_id, error = %e, "Manual report: user lookup failed");
                return false;
            }
        };
        if start > end {
            error!(%user_id, %start, %end, "Manual report: start date is after end date");
            return false;
        }
        let period = ReportPeriod {
            start_date: start,
            end_date: end,
        };
        match self.process_subscriber(&user, period).await {
            Ok((report_id, emailed)) => {
                info!(%user_id, %report_id, emailed, "Manual care report stored");
                true
            }
            Err(e) => {
                error!(%user_id, error = %e, "Manual care report failed");
                false
            }
        }
    }

    /// Generates and stores a diagnosis report, emailing it when the user has
    /// an address. Delivery failure does not fail the call.
    pub async fn generate_diagnosis_report(
        &self,
        user: &User,
        scores: DiagnosisScores,
    ) -> PortResult<ReportLog> {
        let draft = self.generator.generate_diagnosis_report(user, &scores).await?;
        let report = DiagnosisReport {
            report_html: draft.report_html,
            report_text: draft.report_text,
            scores,
        };
        let log = self
            .db
            .create_report_log(user.id, &ReportContent::Diagnosis(report.clone()))
            .await?;

        if user.email.is_none() {
            return Ok(log);
        }
        let delivered = match self.templates.diagnosis_email(user, &report) {
            Ok(email) => match self.mailer.send(&email).await {
                Ok(()) => true,
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "Diagnosis report email failed");
                    false
                }
            },
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Could not prepare diagnosis report email");
                false
            }
        };
        let sent_at = Utc::now();
        self.record_outcome(log.id, delivered, sent_at).await?;
        if delivered {
            return Ok(ReportLog {
                sent_at: Some(sent_at),
                email_sent: true,
                ..log
            });
        }
        Ok(log)
    }

    /// With a kind: that kind's reports from the last 30 days, newest first.
    /// Without: a page of all the user's reports.
    pub async fn report_history(
        &self,
        user_id: Uuid,
        kind: Option<ReportKind>,
        skip: i64,
        limit: i64,
    ) -> PortResult<Vec<ReportLog>> {
        match kind {
            Some(kind) => {
                let since = Utc::now() - Duration::days(RECENT_REPORT_DAYS);
                self.db.list_recent_reports(user_id, kind, since).await
            }
            None => self.db.list_report_logs(user_id, skip, limit).await,
        }
    }
}
