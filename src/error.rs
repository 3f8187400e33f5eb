//! Application-level errors raised while wiring the bot together.

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("Missing config with key \"{key}\"")]
    MissingConfig { key: String },

    #[error("Configuration error: {msg}")]
    ConfigurationError { msg: String },

    #[error("Invalid timezone \"{timezone}\": {msg}")]
    InvalidTimezone { timezone: String, msg: String },

    #[error("Scheduler error: {msg}")]
    SchedulerError { msg: String },
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigurationError { msg: msg.into() }
    }
}
