use crate::delivery::DeliveryError;
use crate::repository::error::DatabaseError;
use crate::service::content_service::ReminderContextBuilderError;
use crate::weather::error::WeatherError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("Unexpected result: {message}")]
    UnexpectedResult { message: String },

    #[error("Deadline exceeded for {unit}")]
    DeadlineExceeded { unit: String },

    #[error("Invalid city name \"{city}\"")]
    InvalidCity { city: String },

    #[error("Todo content must not be empty")]
    EmptyTodo,

    #[error("Invalid reminder time \"{time}\", expected HH:MM")]
    InvalidTime { time: String },

    #[error("Subscription limit of {limit} reached")]
    SubscriptionLimitReached { limit: usize },

    #[error("Subscription {subscription_id} not found")]
    SubscriptionNotFound { subscription_id: i64 },

    #[error("Todo {todo_id} not found")]
    TodoNotFound { todo_id: i64 },

    #[error("DatabaseError: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("WeatherError: {0}")]
    WeatherError(#[from] WeatherError),

    #[error("DeliveryError: {0}")]
    DeliveryError(#[from] DeliveryError),
}

impl From<ReminderContextBuilderError> for ServiceError {
    fn from(e: ReminderContextBuilderError) -> Self {
        ServiceError::UnexpectedResult {
            message: e.to_string(),
        }
    }
}
