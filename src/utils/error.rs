use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Site error: {message}")]
    SiteError { message: String },

    #[error("Slot no longer available: {message}")]
    SlotUnavailable { message: String },

    #[error("Operation '{operation}' timed out after {seconds}s")]
    TimeoutError { operation: String, seconds: u64 },

    #[error("Notification delivery failed: {message}")]
    NotificationError { message: String },

    #[error("A booking run is already in progress")]
    RunInProgress,

    #[error("Scheduler error: {message}")]
    SchedulerError { message: String },
}

pub type Result<T> = std::result::Result<T, BookerError>;

/// 錯誤分類，用於日誌與退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Site,
    Network,
    Timeout,
    Notification,
    Scheduling,
    System,
}

/// 錯誤嚴重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BookerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BookerError::HttpError(_) => ErrorCategory::Network,
            BookerError::IoError(_) | BookerError::SerializationError(_) => ErrorCategory::System,
            BookerError::ConfigError { .. }
            | BookerError::ConfigValidationError { .. }
            | BookerError::InvalidConfigValueError { .. }
            | BookerError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BookerError::AuthError { .. } => ErrorCategory::Authentication,
            BookerError::SiteError { .. } | BookerError::SlotUnavailable { .. } => {
                ErrorCategory::Site
            }
            BookerError::TimeoutError { .. } => ErrorCategory::Timeout,
            BookerError::NotificationError { .. } => ErrorCategory::Notification,
            BookerError::RunInProgress | BookerError::SchedulerError { .. } => {
                ErrorCategory::Scheduling
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Notification => ErrorSeverity::Low,
            ErrorCategory::Site | ErrorCategory::Network | ErrorCategory::Timeout => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Scheduling if matches!(self, BookerError::RunInProgress) => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Configuration
            | ErrorCategory::Authentication
            | ErrorCategory::Scheduling => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            BookerError::TimeoutError { .. } => true,
            BookerError::HttpError(e) => e.is_timeout(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the TOML config file and that every ${VAR} placeholder is set in the environment"
            }
            ErrorCategory::Authentication => {
                "Verify ICONDO_USERNAME / ICONDO_PASSWORD and log in manually once to clear any captcha"
            }
            ErrorCategory::Site => {
                "The portal layout or availability changed; inspect the saved diagnostics"
            }
            ErrorCategory::Network => "Check network connectivity to the portal",
            ErrorCategory::Timeout => {
                "The portal is slow; consider raising portal.step_timeout_seconds"
            }
            ErrorCategory::Notification => "Check the Telegram bot token and chat id",
            ErrorCategory::Scheduling => "Wait for the current run to finish and try again",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            BookerError::AuthError { .. } => "Login to the booking portal was rejected".to_string(),
            BookerError::SlotUnavailable { .. } => {
                "Someone else booked the slot first".to_string()
            }
            BookerError::TimeoutError { operation, .. } => {
                format!("The portal did not respond in time ({})", operation)
            }
            BookerError::RunInProgress => {
                "Another booking run is already in progress".to_string()
            }
            BookerError::MissingConfigError { field } => {
                format!("Missing configuration value: {}", field)
            }
            other => other.to_string(),
        }
    }
}
