use std::env;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupersededMatchPolicy {
    LeavePending,
    AutoReject,
}

impl FromStr for SupersededMatchPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "leave_pending" => Ok(Self::LeavePending),
            "auto_reject" => Ok(Self::AutoReject),
            other => Err(format!(
                "unknown policy {other:?}, expected leave_pending or auto_reject"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other:?}, expected compact or json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub dispatch_queue_size: usize,
    pub event_buffer_size: usize,
    pub notification_timeout_ms: u64,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub superseded_match_policy: SupersededMatchPolicy,
    pub mail_from: String,
    pub map_link_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            dispatch_queue_size: 1024,
            event_buffer_size: 1024,
            notification_timeout_ms: 5_000,
            default_page_size: 20,
            max_page_size: 100,
            superseded_match_policy: SupersededMatchPolicy::LeavePending,
            mail_from: "no-reply@drone-match.local".to_string(),
            map_link_base: "https://www.google.com/maps?q=".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_or_default("LOG_FORMAT", defaults.log_format)?,
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", defaults.dispatch_queue_size)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            notification_timeout_ms: parse_or_default(
                "NOTIFICATION_TIMEOUT_MS",
                defaults.notification_timeout_ms,
            )?,
            default_page_size: parse_or_default("DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: parse_or_default("MAX_PAGE_SIZE", defaults.max_page_size)?,
            superseded_match_policy: parse_or_default(
                "SUPERSEDED_MATCH_POLICY",
                defaults.superseded_match_policy,
            )?,
            mail_from: env::var("MAIL_FROM").unwrap_or(defaults.mail_from),
            map_link_base: env::var("MAP_LINK_BASE").unwrap_or(defaults.map_link_base),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.dispatch_queue_size == 0 || self.event_buffer_size == 0 {
            return Err(AppError::Internal(
                "queue and event buffer sizes must be > 0".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(AppError::Internal(format!(
                "DEFAULT_PAGE_SIZE must be in 1..={}",
                self.max_page_size
            )));
        }
        Ok(())
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, LogFormat, SupersededMatchPolicy};

    #[test]
    fn policy_names_parse_case_insensitively() {
        assert_eq!(
            "AUTO_REJECT".parse::<SupersededMatchPolicy>().unwrap(),
            SupersededMatchPolicy::AutoReject
        );
        assert_eq!(
            "leave_pending".parse::<SupersededMatchPolicy>().unwrap(),
            SupersededMatchPolicy::LeavePending
        );
        assert!("reject_all".parse::<SupersededMatchPolicy>().is_err());
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            default_page_size: 500,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
