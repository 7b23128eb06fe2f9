// Error handling framework
// Startup errors are fatal; everything raised while checking a user is recoverable.

use thiserror::Error;

/// Configuration errors (fatal at startup)
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Either schedule_times or polling_interval_seconds must be configured")]
    NoCadence,

    #[error("Configuration file already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to write configuration file: {0}")]
    Write(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid schedule time '{spec}': {reason}")]
    InvalidTimeSpec { spec: String, reason: String },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("No next execution time available for '{0}'")]
    NoNextExecution(String),
}

/// Errors raised while fetching submissions from the remote API
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("API request failed with status code {0}")]
    HttpStatus(u16),

    #[error("Failed to decode response body: {0}")]
    Decode(String),

    #[error("Failed to parse submissions: {0}")]
    Parse(String),
}

impl FetchError {
    /// Short machine-readable label used as a metrics dimension
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::ClientBuild(_) => "client_build",
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::HttpStatus(_) => "http_status",
            FetchError::Decode(_) => "decode",
            FetchError::Parse(_) => "parse",
        }
    }
}

/// State persistence errors (logged, never fatal)
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State file I/O failed: {0}")]
    Io(String),

    #[error("State serialization failed: {0}")]
    Serialization(String),
}

/// Notification delivery errors (isolated per channel)
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Delivery via {channel} failed: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("{channel} responded with HTTP {status}")]
    HttpStatus { channel: String, status: u16 },

    #[error("Failed to serialize notification: {0}")]
    Serialization(String),
}

/// Errors surfaced by the monitor engine
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for SettingsError {
    fn from(err: config::ConfigError) -> Self {
        SettingsError::Load(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if err.is_builder() {
            FetchError::ClientBuild(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_error_display() {
        let err = ScheduleError::InvalidTimeSpec {
            spec: "25:99".to_string(),
            reason: "hour out of range".to_string(),
        };
        assert!(err.to_string().contains("Invalid schedule time '25:99'"));
    }

    #[test]
    fn test_fetch_error_timeout() {
        let err = FetchError::Timeout(30);
        assert!(err.to_string().contains("30 seconds"));
        assert_eq!(err.reason(), "timeout");
    }

    #[test]
    fn test_monitor_error_wraps_fetch_error() {
        let err: MonitorError = FetchError::HttpStatus(503).into();
        assert_eq!(err.to_string(), "API request failed with status code 503");
    }

    #[test]
    fn test_state_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StateError = serde_err.into();
        assert!(matches!(err, StateError::Serialization(_)));
    }
}
