use crate::adapters::portal::PortalOptions;
use crate::core::retry::{Backoff, BackoffKind, RetryPolicy};
use crate::core::scheduler::TriggerSettings;
use crate::domain::model::{BookingPreference, TimeWindow};
use crate::utils::error::{BookerError, Result};
use crate::utils::validation::{
    parse_time_of_day, validate_non_empty_string, validate_path, validate_range,
    validate_time_window, validate_timezone, validate_url, Validate,
};
use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/booker.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub credentials: Credentials,
    pub portal: PortalSettings,
    #[serde(default)]
    pub booking: BookingSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

// 密碼不進日誌
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSettings {
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_slots_path")]
    pub slots_path: String,
    #[serde(default = "default_booking_path")]
    pub booking_path: String,
    #[serde(default = "default_step_timeout")]
    pub step_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
    #[serde(deserialize_with = "de_weekdays")]
    pub preferred_days: Vec<Weekday>,
    pub time_window: TimeWindowSettings,
    pub preferred_courts: Vec<String>,
    pub booking_duration_hours: u32,
    pub advance_booking_days: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeWindowSettings {
    #[serde(deserialize_with = "de_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    #[serde(deserialize_with = "de_time")]
    pub trigger_time: NaiveTime,
    pub timezone: String,
    pub retry_count: u32,
    pub retry_delay_seconds: u64,
    pub backoff: BackoffKind,
    pub max_retry_delay_seconds: u64,
    pub misfire_grace_seconds: u64,
    pub skip_non_preferred_days: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub enabled: bool,
    pub directory: String,
}

fn default_login_path() -> String {
    "/api/login".to_string()
}

fn default_slots_path() -> String {
    "/api/facilities/tennis/slots".to_string()
}

fn default_booking_path() -> String {
    "/api/facilities/tennis/bookings".to_string()
}

fn default_step_timeout() -> u64 {
    30
}

fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN)
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            preferred_days: vec![Weekday::Sat, Weekday::Sun],
            time_window: TimeWindowSettings::default(),
            preferred_courts: vec!["Tennis Court 1".to_string(), "Tennis Court 2".to_string()],
            booking_duration_hours: 1,
            advance_booking_days: 7,
        }
    }
}

impl Default for TimeWindowSettings {
    fn default() -> Self {
        Self {
            start: hms(8, 0, 0),
            end: hms(11, 0, 0),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            trigger_time: hms(0, 0, 5),
            timezone: "Asia/Singapore".to_string(),
            retry_count: 3,
            retry_delay_seconds: 5,
            backoff: BackoffKind::Exponential,
            max_retry_delay_seconds: 60,
            misfire_grace_seconds: 60,
            skip_non_preferred_days: true,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            telegram_bot_token: None,
            telegram_chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "screenshots".to_string(),
        }
    }
}

fn de_time<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_time_of_day(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid time '{}', expected HH:MM or HH:MM:SS", raw))
    })
}

fn de_weekdays<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<Weekday>, D::Error> {
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.iter()
        .map(|day| {
            day.trim()
                .parse::<Weekday>()
                .map_err(|_| serde::de::Error::custom(format!("invalid weekday '{}'", day)))
        })
        .collect()
}

impl Settings {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BookerError::ConfigError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| BookerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ICONDO_PASSWORD})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| BookerError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn timezone(&self) -> Result<Tz> {
        validate_timezone("scheduler.timezone", &self.scheduler.timezone)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.portal.step_timeout_seconds)
    }

    pub fn booking_preference(&self) -> Result<BookingPreference> {
        let window = &self.booking.time_window;
        Ok(BookingPreference {
            preferred_days: self.booking.preferred_days.clone(),
            time_window: TimeWindow::new(window.start, window.end)?,
            court_priority: self.booking.preferred_courts.clone(),
            advance_booking_days: self.booking.advance_booking_days,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_secs(self.scheduler.retry_delay_seconds);
        let backoff = match self.scheduler.backoff {
            BackoffKind::Fixed => Backoff::Fixed(initial),
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                max: Duration::from_secs(self.scheduler.max_retry_delay_seconds).max(initial),
            },
        };
        RetryPolicy {
            retry_count: self.scheduler.retry_count,
            backoff,
        }
    }

    pub fn trigger_settings(&self) -> Result<TriggerSettings> {
        Ok(TriggerSettings {
            trigger_time: self.scheduler.trigger_time,
            timezone: self.timezone()?,
            misfire_grace: Duration::from_secs(self.scheduler.misfire_grace_seconds),
            skip_non_preferred_days: self.scheduler.skip_non_preferred_days,
        })
    }

    pub fn portal_options(&self) -> PortalOptions {
        PortalOptions {
            base_url: self.portal.base_url.clone(),
            login_path: self.portal.login_path.clone(),
            slots_path: self.portal.slots_path.clone(),
            booking_path: self.portal.booking_path.clone(),
            username: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
            booking_duration: chrono::Duration::hours(i64::from(self.booking.booking_duration_hours)),
            request_timeout: self.step_timeout(),
        }
    }

    /// 驗證設定的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("credentials.username", &self.credentials.username)?;
        validate_non_empty_string("credentials.password", &self.credentials.password)?;
        for (field, value) in [
            ("credentials.username", &self.credentials.username),
            ("credentials.password", &self.credentials.password),
        ] {
            if value.contains("${") {
                return Err(BookerError::MissingConfigError {
                    field: field.to_string(),
                });
            }
        }

        validate_url("portal.base_url", &self.portal.base_url)?;
        validate_range("portal.step_timeout_seconds", self.portal.step_timeout_seconds, 1, 300)?;

        if self.booking.preferred_days.is_empty() {
            return Err(BookerError::ConfigValidationError {
                field: "booking.preferred_days".to_string(),
                message: "At least one preferred day is required".to_string(),
            });
        }
        validate_time_window(
            "booking.time_window",
            self.booking.time_window.start,
            self.booking.time_window.end,
        )?;
        validate_range("booking.booking_duration_hours", self.booking.booking_duration_hours, 1, 2)?;

        self.timezone()?;
        if self.scheduler.retry_delay_seconds == 0 && self.scheduler.retry_count > 0 {
            return Err(BookerError::InvalidConfigValueError {
                field: "scheduler.retry_delay_seconds".to_string(),
                value: "0".to_string(),
                reason: "Retry delay must be positive when retries are enabled".to_string(),
            });
        }

        if self.notifications.enabled {
            validate_url("notifications.api_base", &self.notifications.api_base)?;
        }
        if self.diagnostics.enabled {
            validate_path("diagnostics.directory", &self.diagnostics.directory)?;
        }

        Ok(())
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
