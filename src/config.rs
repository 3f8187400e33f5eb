//! Environment-driven configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::error::AppError;

/// Feature toggles for optional background work.
#[derive(Clone, Debug)]
pub struct Features {
    pub warning_monitor: bool,
    pub calendar: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            warning_monitor: true,
            calendar: true,
        }
    }
}

#[derive(Clone, Default)]
pub struct TelegramConfig {
    pub token: String,
    pub api_url: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &redact(&self.token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct QWeatherConfig {
    pub api_key: String,
    /// Host serving `/v7/*` and `/airquality/v1/*`, e.g. `https://devapi.qweather.com`.
    pub api_host: String,
    /// Host serving `/geo/v2/*`.
    pub geo_host: String,
}

impl fmt::Debug for QWeatherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QWeatherConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_host", &self.api_host)
            .field("geo_host", &self.geo_host)
            .finish()
    }
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Secrets never reach `Debug` output.
fn redact(secret: &str) -> &str {
    if secret.is_empty() { "" } else { "[REDACTED]" }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.7,
            max_retries: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub timezone: Tz,
    pub warning_poll_interval: Duration,
    pub db_url: String,
    pub db_path: String,
    pub logs_path: PathBuf,
    pub telegram: TelegramConfig,
    pub qweather: QWeatherConfig,
    pub openai: OpenAiConfig,
    pub features: Features,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn new() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let timezone = parse_timezone(&env.or("TIMEZONE", "Asia/Shanghai"))?;

        let openai_enabled = env.parse_or("OPENAI_ENABLED", false)?;
        let openai = OpenAiConfig {
            enabled: openai_enabled,
            api_key: if openai_enabled {
                env.required("OPENAI_API_KEY")?
            } else {
                env.or("OPENAI_API_KEY", "")
            },
            base_url: env.or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env.or("OPENAI_MODEL", "gpt-4o-mini"),
            max_tokens: env.parse_or("OPENAI_MAX_TOKENS", 800)?,
            temperature: env.parse_or("OPENAI_TEMPERATURE", 0.7)?,
            max_retries: env.parse_or("OPENAI_MAX_RETRIES", 3)?,
            timeout: Duration::from_secs(env.parse_or("OPENAI_TIMEOUT", 30)?),
        };

        Ok(Self {
            timezone,
            warning_poll_interval: Duration::from_secs(
                env.parse_or("WARNING_POLL_INTERVAL", 900u64)?.max(1),
            ),
            db_url: env.or("DB_URL", "sqlite://data/data.db"),
            db_path: env.or("DB_PATH", "data/data.db"),
            logs_path: PathBuf::from(env.or("LOGS_PATH", "logs")),
            telegram: TelegramConfig {
                token: env.required("TELEGRAM_TOKEN")?,
                api_url: env.or("TELEGRAM_API_URL", "https://api.telegram.org"),
            },
            qweather: QWeatherConfig {
                api_key: env.required("QWEATHER_API_KEY")?,
                api_host: env.or("QWEATHER_API_HOST", "https://devapi.qweather.com"),
                geo_host: env.or("QWEATHER_GEO_HOST", "https://geoapi.qweather.com"),
            },
            openai,
            features: Features {
                warning_monitor: env.parse_or("FEATURE_WARNING_MONITOR", true)?,
                calendar: env.parse_or("FEATURE_CALENDAR", true)?,
            },
        })
    }
}

/// Parses an IANA timezone name such as `Asia/Shanghai`.
pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    Tz::from_str(name).map_err(|e| AppError::InvalidTimezone {
        timezone: name.to_string(),
        msg: e.to_string(),
    })
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.get(key).ok_or_else(|| AppError::MissingConfig {
            key: key.to_string(),
        })
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse::<T>().map_err(|e| {
                AppError::config(format!("Invalid value \"{raw}\" for {key}: {e}"))
            }),
            None => Ok(default),
        }
    }
}
