// Configuration management with layered configuration (defaults, file, env)

use crate::errors::{ScheduleError, SettingsError};
use crate::monitor::{Cadence, MonitorConfig};
use crate::schedule::{parse_timezone, TimeSpec};
use crate::state::DEFAULT_STATE_PATH;
use chrono::Utc;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Prefix for environment overrides, e.g. `AC_MONITOR__USERS=tourist,jiangly`
pub const ENV_PREFIX: &str = "AC_MONITOR";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0.0.0 Safari/537.36";

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AtCoder user ids to watch, checked in this order
    pub users: Vec<String>,
    pub polling_interval_seconds: Option<f64>,
    pub retry_delay_seconds: f64,
    /// "HH:MM" or 5-field cron strings; takes precedence over polling when present
    pub schedule_times: Option<Vec<String>>,
    /// IANA timezone used for schedule times and console timestamps
    pub timezone: String,
    pub state_path: String,
    pub api: ApiConfig,
    pub notifications: NotificationConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Window used on a user's first check
    pub lookback_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub console: bool,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_port: Option<u16>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kenkoooo.com/atcoder/atcoder-api".to_string(),
            timeout_seconds: 30,
            lookback_seconds: 24 * 60 * 60,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            console: true,
            discord_webhook_url: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_port: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            polling_interval_seconds: None,
            retry_delay_seconds: 60.0,
            schedule_times: None,
            timezone: "Asia/Tokyo".to_string(),
            state_path: DEFAULT_STATE_PATH.to_string(),
            api: ApiConfig::default(),
            notifications: NotificationConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn invalid(field: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidFieldValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Positive number of seconds that fits in a `Duration`
fn seconds(field: &str, value: f64) -> Result<Duration, SettingsError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(field, "must be a positive number"));
    }
    Duration::try_from_secs_f64(value).map_err(|e| invalid(field, &e.to_string()))
}

/// `AC_MONITOR__*` overrides; `users` and `schedule_times` take comma-separated lists
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("users")
        .with_list_parse_key("schedule_times")
}

impl Settings {
    /// Load configuration from `config.json` in the working directory
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration with layered precedence: defaults → file → env
    ///
    /// The file format follows its extension (json, toml, yaml). A missing file
    /// is not an error here; validation reports the missing users instead.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        Self::load_layered(path, environment())
    }

    fn load_layered<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Configuration file not found, using defaults");
        }

        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(env);

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.users.is_empty() {
            return Err(SettingsError::MissingField("users".to_string()));
        }
        if self.users.iter().any(|u| u.trim().is_empty()) {
            return Err(invalid("users", "user ids cannot be blank"));
        }

        if let Some(interval) = self.polling_interval_seconds {
            seconds("polling_interval_seconds", interval)?;
        }
        seconds("retry_delay_seconds", self.retry_delay_seconds)?;

        if let Some(times) = &self.schedule_times {
            if times.is_empty() {
                return Err(invalid("schedule_times", "must contain at least one time"));
            }
        }
        if self.schedule_times.is_none() && self.polling_interval_seconds.is_none() {
            return Err(SettingsError::NoCadence);
        }

        parse_timezone(&self.timezone)?;

        if self.state_path.is_empty() {
            return Err(invalid("state_path", "cannot be empty"));
        }
        if self.api.base_url.is_empty() {
            return Err(invalid("api.base_url", "cannot be empty"));
        }
        if self.api.timeout_seconds == 0 {
            return Err(invalid("api.timeout_seconds", "must be greater than 0"));
        }

        Ok(())
    }

    /// Select the cadence mode. Schedule times win over polling.
    ///
    /// Every schedule time must have an upcoming firing; a cron expression
    /// naming an impossible date is rejected here rather than when the
    /// scheduled loop first runs.
    pub fn cadence(&self) -> Result<Cadence, SettingsError> {
        match (&self.schedule_times, self.polling_interval_seconds) {
            (Some(times), _) if !times.is_empty() => {
                let timezone = parse_timezone(&self.timezone)?;
                let now = Utc::now();
                let specs = times
                    .iter()
                    .map(|t| {
                        let spec = TimeSpec::parse(t)?;
                        match spec.next_after(now, timezone) {
                            Some(_) => Ok(spec),
                            None => Err(ScheduleError::NoNextExecution(t.clone())),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Cadence::Scheduled { specs, timezone })
            }
            (_, Some(interval)) => Ok(Cadence::Polling {
                interval: seconds("polling_interval_seconds", interval)?,
            }),
            _ => Err(SettingsError::NoCadence),
        }
    }

    /// Validate and build the engine configuration
    pub fn monitor_config(&self) -> Result<MonitorConfig, SettingsError> {
        self.validate()?;
        Ok(MonitorConfig {
            users: self.users.clone(),
            retry_delay: seconds("retry_delay_seconds", self.retry_delay_seconds)?,
            cadence: self.cadence()?,
        })
    }

    /// Webhook URL from config, falling back to `DISCORD_WEBHOOK_URL`
    pub fn discord_webhook_url(&self) -> Option<String> {
        self.notifications
            .discord_webhook_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                std::env::var("DISCORD_WEBHOOK_URL")
                    .ok()
                    .filter(|url| !url.is_empty())
            })
    }
}

/// Write a sample configuration (scheduled mode) without overwriting an existing file
pub fn write_sample_config<P: AsRef<Path>>(path: P) -> Result<(), SettingsError> {
    let path = path.as_ref();
    if path.exists() {
        return Err(SettingsError::AlreadyExists(path.display().to_string()));
    }

    let sample = serde_json::json!({
        "users": ["tourist", "jiangly"],
        "retry_delay_seconds": 60,
        "schedule_times": ["09:00", "21:00"],
        "timezone": "Asia/Tokyo",
    });
    let content = serde_json::to_string_pretty(&sample)
        .map_err(|e| SettingsError::Write(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SettingsError::Write(e.to_string()))?;
    }
    std::fs::write(path, content).map_err(|e| SettingsError::Write(e.to_string()))
}
