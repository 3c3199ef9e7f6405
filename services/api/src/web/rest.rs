//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification of the REST API.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::web::{auth, care, diagnosis, report, user};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::refresh_handler,
        auth::validate_handler,
        user::get_me_handler,
        user::update_me_handler,
        user::update_subscription_handler,
        care::chat_handler,
        care::create_log_handler,
        care::list_logs_handler,
        care::weekly_status_handler,
        care::greeting_handler,
        care::summary_handler,
        care::tts_handler,
        care::upsert_daily_score_handler,
        care::list_daily_scores_handler,
        diagnosis::submit_handler,
        diagnosis::list_logs_handler,
        diagnosis::get_log_handler,
        diagnosis::latest_handler,
        diagnosis::session_handler,
        diagnosis::statistics_handler,
        report::generate_care_handler,
        report::generate_diagnosis_handler,
        report::history_handler,
        report::detail_handler,
        report::scheduler_start_handler,
        report::scheduler_stop_handler,
        report::scheduler_status_handler,
        report::generate_weekly_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginForm,
            auth::TokenResponse,
            auth::RefreshRequest,
            auth::ValidateResponse,
            user::UserResponse,
            user::ProfileUpdateRequest,
            user::SubscriptionRequest,
            care::ConversationLogResponse,
            care::CreateLogRequest,
            care::DayStatusResponse,
            care::WeeklyStatusResponse,
            care::GreetingResponse,
            care::SummaryResponse,
            care::TtsRequest,
            care::DailyScorePayload,
            diagnosis::SubmitRequest,
            diagnosis::DiagnosisLogResponse,
            diagnosis::StatisticsResponse,
            report::CareReportRequest,
            report::DiagnosisReportRequest,
            report::ReportCreatedResponse,
            report::ReportLogResponse,
            report::ManualReportRequest,
            report::MessageResponse,
            report::JobStatusResponse,
            report::SchedulerStatusResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "User", description = "Signup, login and profile."),
        (name = "Auth", description = "Token refresh and validation."),
        (name = "Care", description = "Daily care conversations and scores."),
        (name = "Diagnosis", description = "Cognitive diagnosis sessions."),
        (name = "Report", description = "Care and diagnosis reports."),
        (name = "Scheduler", description = "Weekly care report scheduling.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/user/signup",
            "/api/auth/refresh",
            "/api/care/weekly-status",
            "/api/diagnosis/statistics",
            "/api/report/{report_id}",
            "/api/report/scheduler/generate-weekly",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
