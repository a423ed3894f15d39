use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{PunchdError, Result};
use crate::types::{RetryPolicy, TimeWindow};

/// Top-level config (punchd.toml + PUNCHD_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunchdConfig {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub portal: PortalConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// When punching is allowed and how instants are randomized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Daily window start, "HH:MM" wall-clock.
    #[serde(default = "default_window_start")]
    pub window_start: String,
    /// Daily window end, "HH:MM" wall-clock.
    #[serde(default = "default_window_end")]
    pub window_end: String,
    /// Allowed weekdays, ISO numbering (1 = Monday … 7 = Sunday).
    #[serde(default = "default_weekdays")]
    pub weekdays: Vec<u8>,
    /// Width of the randomized window a target instant is picked from.
    #[serde(default = "default_jitter_minutes")]
    pub jitter_minutes: u32,
    /// Minimum elapsed time between sign-in and the sign-out target.
    #[serde(default = "default_min_work_minutes")]
    pub min_work_minutes: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            weekdays: default_weekdays(),
            jitter_minutes: default_jitter_minutes(),
            min_work_minutes: default_min_work_minutes(),
        }
    }
}

/// Bounded-retry settings for the action runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per action, including the first. Must be >= 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds to wait between attempts.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

/// Timesheet portal endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal base URL, without trailing slash.
    pub base_url: String,
    /// Company code submitted with the login form.
    pub company: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_portal_timeout_secs")]
    pub timeout_secs: u64,
}

/// Optional notification channels.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

fn default_window_start() -> String {
    "09:00".to_string()
}
fn default_window_end() -> String {
    "18:00".to_string()
}
fn default_weekdays() -> Vec<u8> {
    vec![1, 2, 3, 4, 5]
}
fn default_jitter_minutes() -> u32 {
    30
}
fn default_min_work_minutes() -> u32 {
    540 // 9 hours
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_secs() -> u64 {
    60
}
fn default_portal_timeout_secs() -> u64 {
    30
}

impl PunchdConfig {
    /// Load config from a TOML file with PUNCHD_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.punchd/punchd.toml
    ///
    /// Env keys use `__` as the section separator
    /// (e.g. `PUNCHD_PORTAL__BASE_URL`).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PunchdConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PUNCHD_").split("__"))
            .extract()
            .map_err(|e| PunchdError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Validate everything the daemon relies on, failing fast with a
    /// descriptive error. Called once at startup.
    pub fn validate(&self) -> Result<()> {
        self.policy.window()?;
        self.retry.policy()?;

        if self.portal.base_url.is_empty() {
            return Err(PunchdError::Config("portal.base_url is required".into()));
        }
        if self.portal.username.is_empty() || self.portal.password.is_empty() {
            return Err(PunchdError::Config(
                "portal.username and portal.password are required".into(),
            ));
        }

        Ok(())
    }
}

impl PolicyConfig {
    /// Parse and validate the policy window.
    pub fn window(&self) -> Result<TimeWindow> {
        let start = parse_time_of_day(&self.window_start)?;
        let end = parse_time_of_day(&self.window_end)?;
        if start >= end {
            return Err(PunchdError::Config(format!(
                "policy window start ({}) must be before end ({})",
                self.window_start, self.window_end
            )));
        }

        if self.weekdays.is_empty() {
            return Err(PunchdError::Config(
                "policy.weekdays must not be empty".into(),
            ));
        }
        let weekdays = self
            .weekdays
            .iter()
            .map(|&n| weekday_from_iso(n))
            .collect::<Result<Vec<Weekday>>>()?;

        Ok(TimeWindow {
            start,
            end,
            weekdays,
        })
    }

    pub fn min_work_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_work_minutes as i64)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy> {
        if self.max_attempts < 1 {
            return Err(PunchdError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_secs(self.backoff_secs),
        })
    }
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| PunchdError::Config(format!("invalid time of day: {s:?} (expected HH:MM)")))
}

fn weekday_from_iso(n: u8) -> Result<Weekday> {
    match n {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(PunchdError::Config(format!(
            "invalid weekday number: {other} (expected 1-7, Monday = 1)"
        ))),
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.punchd/punchd.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_parses() {
        let window = PolicyConfig::default().window().unwrap();
        assert_eq!(window.start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(window.end, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(window.weekdays.len(), 5);
        assert!(!window.weekdays.contains(&Weekday::Sat));
        assert!(!window.weekdays.contains(&Weekday::Sun));
    }

    #[test]
    fn inverted_window_rejected() {
        let policy = PolicyConfig {
            window_start: "18:00".into(),
            window_end: "09:00".into(),
            ..PolicyConfig::default()
        };
        assert!(policy.window().is_err());
    }

    #[test]
    fn equal_start_and_end_rejected() {
        let policy = PolicyConfig {
            window_start: "09:00".into(),
            window_end: "09:00".into(),
            ..PolicyConfig::default()
        };
        assert!(policy.window().is_err());
    }

    #[test]
    fn out_of_range_weekday_rejected() {
        let policy = PolicyConfig {
            weekdays: vec![1, 8],
            ..PolicyConfig::default()
        };
        assert!(policy.window().is_err());
    }

    #[test]
    fn empty_weekdays_rejected() {
        let policy = PolicyConfig {
            weekdays: vec![],
            ..PolicyConfig::default()
        };
        assert!(policy.window().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let retry = RetryConfig {
            max_attempts: 0,
            backoff_secs: 1,
        };
        assert!(retry.policy().is_err());
    }

    #[test]
    fn single_attempt_allowed() {
        let retry = RetryConfig {
            max_attempts: 1,
            backoff_secs: 1,
        };
        let policy = retry.policy().unwrap();
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn bad_time_string_rejected() {
        assert!(parse_time_of_day("9am").is_err());
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("09:00").is_ok());
        assert!(parse_time_of_day("09:00:30").is_ok());
    }
}
