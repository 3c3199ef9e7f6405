//! services/api/src/report/email_template.rs
//!
//! Renders report emails. Templates are registered under `.html` names so
//! `minijinja` escapes every interpolated value; only the AI-generated report
//! body is inserted raw via `|safe`.

use minijinja::{context, Environment};
use mindi_core::calendar::DATE_FORMAT;
use mindi_core::domain::{CareReport, DiagnosisReport, OutgoingEmail, User};
use mindi_core::ports::{PortError, PortResult};

const CARE_TEMPLATE_NAME: &str = "care_report.html";
const DIAGNOSIS_TEMPLATE_NAME: &str = "diagnosis_report.html";

const LAYOUT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<style>
  body { font-family: 'Malgun Gothic', sans-serif; line-height: 1.6; color: #333; }
  .header { background: #4a90e2; color: #fff; padding: 20px; text-align: center; }
  .content { padding: 20px; }
  .summary { background: #f5f7fa; padding: 15px; border-radius: 8px; margin-bottom: 20px; }
  .footer { margin-top: 30px; font-size: 12px; color: #888; }
</style>
</head>
<body>
  <div class="header"><h1>{% block title %}{% endblock %}</h1></div>
  <div class="content">
    <h2>안녕하세요, {{ user_name }}님!</h2>
    {% block body %}{% endblock %}
    {{ report_html|safe }}
    <div class="footer">
      <p>본 이메일은 MINDI 서비스에서 자동으로 발송되었습니다.</p>
      <p>문의사항이 있으시면 고객센터로 연락해 주세요.</p>
    </div>
  </div>
</body>
</html>
"#;

const CARE_TEMPLATE: &str = r#"{% extends "layout.html" %}
{% block title %}주간 케어 서비스 분석 리포트{% endblock %}
{% block body %}
    <p>지난 주 MINDI와의 대화를 분석한 결과를 알려드립니다.</p>
    <div class="summary">
      <h3>주간 활동 요약</h3>
      <ul>
        <li>분석 기간: {{ start_date }} ~ {{ end_date }}</li>
        <li>총 대화 횟수: {{ conversation_count }}회</li>
        <li>평균 일일 대화: {{ daily_average }}회</li>
      </ul>
    </div>
{% endblock %}
"#;

const DIAGNOSIS_TEMPLATE: &str = r#"{% extends "layout.html" %}
{% block title %}인지 기능 진단 결과 리포트{% endblock %}
{% block body %}
    <p>MINDI 인지 기능 진단이 완료되었습니다. 아래 결과를 확인해 주세요.</p>
    <div class="summary">
      <h3>진단 점수 요약</h3>
      <ul>
        <li>음성 속도/억양 점수: {{ acoustic_score_vit }}</li>
        <li>음성 안정성 점수: {{ acoustic_score_lgbm }}</li>
        <li>언어 이해 점수: {{ language_score_bert }}</li>
        <li>의사소통 점수: {{ language_score_gpt }}</li>
      </ul>
    </div>
{% endblock %}
"#;

pub fn care_subject(user_name: &str) -> String {
    format!("[MINDI] {user_name}님의 주간 케어 서비스 분석 리포트")
}

pub fn diagnosis_subject(user_name: &str) -> String {
    format!("[MINDI] {user_name}님의 인지 기능 진단 결과 리포트")
}

/// Whole turns per day over a seven-day week, rounded down.
pub fn daily_average(conversation_count: usize) -> usize {
    conversation_count / 7
}

fn render_error(e: minijinja::Error) -> PortError {
    PortError::Unexpected(format!("Failed to render email: {e}"))
}

/// The compiled set of report email templates.
pub struct EmailTemplates {
    env: Environment<'static>,
}

impl EmailTemplates {
    pub fn new() -> PortResult<Self> {
        let mut env = Environment::new();
        env.add_template("layout.html", LAYOUT_TEMPLATE)
            .map_err(render_error)?;
        env.add_template(CARE_TEMPLATE_NAME, CARE_TEMPLATE)
            .map_err(render_error)?;
        env.add_template(DIAGNOSIS_TEMPLATE_NAME, DIAGNOSIS_TEMPLATE)
            .map_err(render_error)?;
        Ok(Self { env })
    }

    pub fn render_care(&self, user_name: &str, report: &CareReport) -> PortResult<String> {
        self.env
            .get_template(CARE_TEMPLATE_NAME)
            .and_then(|t| {
                t.render(context! {
                    user_name => user_name,
                    start_date => report.period.start_date.format(DATE_FORMAT).to_string(),
                    end_date => report.period.end_date.format(DATE_FORMAT).to_string(),
                    conversation_count => report.conversation_count,
                    daily_average => daily_average(report.conversation_count),
                    report_html => report.report_html.as_str(),
                })
            })
            .map_err(render_error)
    }

    pub fn render_diagnosis(&self, user_name: &str, report: &DiagnosisReport) -> PortResult<String> {
        let scores = &report.scores;
        self.env
            .get_template(DIAGNOSIS_TEMPLATE_NAME)
            .and_then(|t| {
                t.render(context! {
                    user_name => user_name,
                    acoustic_score_vit => scores.acoustic_score_vit,
                    acoustic_score_lgbm => scores.acoustic_score_lgbm,
                    language_score_bert => scores.language_score_bert,
                    language_score_gpt => scores.language_score_gpt,
                    report_html => report.report_html.as_str(),
                })
            })
            .map_err(render_error)
    }

    /// The weekly care email for `user`, who must have an email address.
    pub fn care_email(&self, user: &User, report: &CareReport) -> PortResult<OutgoingEmail> {
        Ok(OutgoingEmail {
            to: recipient(user)?,
            subject: care_subject(&user.name),
            html_body: self.render_care(&user.name, report)?,
            text_body: Some(report.report_text.clone()),
            attachments: vec![],
        })
    }

    pub fn diagnosis_email(&self, user: &User, report: &DiagnosisReport) -> PortResult<OutgoingEmail> {
        Ok(OutgoingEmail {
            to: recipient(user)?,
            subject: diagnosis_subject(&user.name),
            html_body: self.render_diagnosis(&user.name, report)?,
            text_body: Some(report.report_text.clone()),
            attachments: vec![],
        })
    }
}

fn recipient(user: &User) -> PortResult<String> {
    user.email
        .clone()
        .ok_or_else(|| PortError::Unexpected(format!("User {} has no email address", user.id)))
}
