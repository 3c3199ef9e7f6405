//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::{NaiveTime, Weekday};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// SMTP relay settings for outgoing report emails.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// When the weekly care report cycle fires, in server-local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportSchedule {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub secret_key: String,
    pub access_token_ttl: chrono::Duration,
    pub ai_server_url: String,
    pub ai_timeout: Duration,
    pub diagnosis_timeout: Duration,
    pub openai_api_key: Option<String>,
    pub tts_model: String,
    pub tts_voice: String,
    pub smtp: SmtpConfig,
    pub cors_origin: String,
    pub scheduler_enabled: bool,
    pub report_schedule: ReportSchedule,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;
        let database_url = required("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Token Settings ---
        let secret_key = required("SECRET_KEY")?;
        if secret_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "SECRET_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }
        let access_minutes: i64 = parse_var(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            &var_or("ACCESS_TOKEN_EXPIRE_MINUTES", "30"),
        )?;
        let access_token_ttl = Some(access_minutes)
            .filter(|m| *m > 0)
            .and_then(chrono::Duration::try_minutes)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ACCESS_TOKEN_EXPIRE_MINUTES".to_string(),
                    format!("{access_minutes} is not a usable positive number of minutes"),
                )
            })?;

        // --- Load Collaborator Settings ---
        let ai_server_url = var_or("AI_SERVER_URL", "http://localhost:8001")
            .trim_end_matches('/')
            .to_string();
        let ai_timeout_secs: u64 = parse_var("AI_TIMEOUT_SECS", &var_or("AI_TIMEOUT_SECS", "60"))?;
        let diagnosis_timeout_secs: u64 = parse_var(
            "DIAGNOSIS_TIMEOUT_SECS",
            &var_or("DIAGNOSIS_TIMEOUT_SECS", "120"),
        )?;

        let openai_api_key = lookup("OPENAI_API_KEY");
        let tts_model = var_or("TTS_MODEL", "tts-1-hd");
        let tts_voice = var_or("TTS_VOICE", "alloy");

        let smtp = SmtpConfig {
            server: var_or("SMTP_SERVER", "localhost"),
            port: parse_var("SMTP_PORT", &var_or("SMTP_PORT", "587"))?,
            username: var_or("SMTP_USERNAME", ""),
            password: var_or("SMTP_PASSWORD", ""),
            from_email: var_or("FROM_EMAIL", "noreply@localhost"),
            from_name: var_or("FROM_NAME", "MINDI"),
        };

        // --- Load Scheduler Settings ---
        let scheduler_enabled: bool = parse_var(
            "SCHEDULER_ENABLED",
            &var_or("SCHEDULER_ENABLED", "true"),
        )?;
        let weekday_str = var_or("REPORT_WEEKDAY", "sun");
        let weekday = Weekday::from_str(&weekday_str).map_err(|_| {
            ConfigError::InvalidValue("REPORT_WEEKDAY".to_string(), weekday_str.clone())
        })?;
        let hour: u32 = parse_var("REPORT_HOUR", &var_or("REPORT_HOUR", "9"))?;
        let minute: u32 = parse_var("REPORT_MINUTE", &var_or("REPORT_MINUTE", "0"))?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            ConfigError::InvalidValue(
                "REPORT_HOUR/REPORT_MINUTE".to_string(),
                format!("{hour:02}:{minute:02} is not a valid time"),
            )
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            secret_key,
            access_token_ttl,
            ai_server_url,
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            diagnosis_timeout: Duration::from_secs(diagnosis_timeout_secs),
            openai_api_key,
            tts_model,
            tts_voice,
            smtp,
            cors_origin: var_or("CORS_ORIGIN", "http://localhost:3000"),
            scheduler_enabled,
            report_schedule: ReportSchedule { weekday, time },
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/mindi"),
            ("SECRET_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.access_token_ttl, chrono::Duration::minutes(30));
        assert_eq!(config.ai_server_url, "http://localhost:8001");
        assert_eq!(config.ai_timeout, Duration::from_secs(60));
        assert_eq!(config.diagnosis_timeout, Duration::from_secs(120));
        assert_eq!(config.smtp.port, 587);
        assert!(config.scheduler_enabled);
        assert_eq!(config.report_schedule.weekday, Weekday::Sun);
        assert_eq!(config.report_schedule.time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn missing_secret_is_reported_by_name() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "SECRET_KEY"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = [("DATABASE_URL", "postgres://x"), ("SECRET_KEY", "s")];

        let mut bad_ttl = base.to_vec();
        bad_ttl.push(("ACCESS_TOKEN_EXPIRE_MINUTES", "soon"));
        assert!(matches!(
            Config::from_lookup(lookup(&bad_ttl)),
            Err(ConfigError::InvalidValue(ref k, _)) if k == "ACCESS_TOKEN_EXPIRE_MINUTES"
        ));

        let mut bad_hour = base.to_vec();
        bad_hour.push(("REPORT_HOUR", "25"));
        assert!(Config::from_lookup(lookup(&bad_hour)).is_err());

        let mut bad_day = base.to_vec();
        bad_day.push(("REPORT_WEEKDAY", "someday"));
        assert!(Config::from_lookup(lookup(&bad_day)).is_err());
    }

    #[test]
    fn token_lifetime_must_be_positive_and_representable() {
        let base = [("DATABASE_URL", "postgres://x"), ("SECRET_KEY", "s")];
        let max = i64::MAX.to_string();

        for raw in ["0", "-5", max.as_str()] {
            let mut vars = base.to_vec();
            vars.push(("ACCESS_TOKEN_EXPIRE_MINUTES", raw));
            assert!(
                matches!(
                    Config::from_lookup(lookup(&vars)),
                    Err(ConfigError::InvalidValue(ref k, _)) if k == "ACCESS_TOKEN_EXPIRE_MINUTES"
                ),
                "{raw} should be rejected"
            );
        }

        let mut day = base.to_vec();
        day.push(("ACCESS_TOKEN_EXPIRE_MINUTES", "1440"));
        let config = Config::from_lookup(lookup(&day)).unwrap();
        assert_eq!(config.access_token_ttl, chrono::Duration::days(1));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_ai_url() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SECRET_KEY", "s"),
            ("AI_SERVER_URL", "http://ai:9000/"),
            ("REPORT_WEEKDAY", "mon"),
        ]))
        .unwrap();
        assert_eq!(config.ai_server_url, "http://ai:9000");
        assert_eq!(config.report_schedule.weekday, Weekday::Mon);
    }
}
