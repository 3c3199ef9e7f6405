//! services/api/src/report/scheduler.rs
//!
//! Background timer that fires the weekly care report cycle.

use crate::config::ReportSchedule;
use crate::report::workflow::ReportWorkflow;
use chrono::Local;
use mindi_core::calendar::next_weekly_run;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const WEEKLY_JOB_ID: &str = "weekly_care_reports";
pub const WEEKLY_JOB_NAME: &str = "Weekly care report generation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub id: String,
    pub name: String,
    /// Server-local time, `YYYY-MM-DDTHH:MM:SS`.
    pub next_run_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub job_count: usize,
    pub jobs: Vec<JobStatus>,
}

/// Owns the weekly timer task. Constructed once in `main` and shared through
/// the application state.
pub struct ReportScheduler {
    workflow: Arc<ReportWorkflow>,
    schedule: ReportSchedule,
    running: Mutex<Option<CancellationToken>>,
}

impl ReportScheduler {
    pub fn new(workflow: Arc<ReportWorkflow>, schedule: ReportSchedule) -> Self {
        Self {
            workflow,
            schedule,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Spawns the timer task. Returns `false` if it was already running.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return false;
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let workflow = self.workflow.clone();
        let schedule = self.schedule;

        tokio::spawn(async move {
            loop {
                let now = Local::now().naive_local();
                let next = next_weekly_run(now, schedule.weekday, schedule.time);
                let wait = (next - now).to_std().unwrap_or_default();
                info!(next_run = %next, "Weekly care report cycle scheduled");

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {
                        let today = Local::now().date_naive();
                        if let Err(e) = workflow.run_scheduled_report_cycle(today).await {
                            error!(error = %e, "Weekly care report cycle aborted");
                        }
                    }
                }
            }
            info!("Report scheduler task exited");
        });

        *running = Some(token);
        info!(job = WEEKLY_JOB_ID, "Report scheduler started");
        true
    }

    /// Cancels the timer task. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                info!("Report scheduler stopped");
                true
            }
            _ => false,
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        if !self.is_running() {
            return SchedulerStatus {
                is_running: false,
                job_count: 0,
                jobs: vec![],
            };
        }
        let next = next_weekly_run(
            Local::now().naive_local(),
            self.schedule.weekday,
            self.schedule.time,
        );
        SchedulerStatus {
            is_running: true,
            job_count: 1,
            jobs: vec![JobStatus {
                id: WEEKLY_JOB_ID.to_string(),
                name: WEEKLY_JOB_NAME.to_string(),
                next_run_time: Some(next.format("%Y-%m-%dT%H:%M:%S").to_string()),
            }],
        }
    }
}

impl Drop for ReportScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
