//! Text completion collaborator used for AI-written reminders.

use async_trait::async_trait;
use tokio::time::Instant;

pub mod openai_client;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Completion API error: {message}")]
    ApiError { message: String },

    #[error("Completion API returned status {status}")]
    BadStatus { status: u16 },

    #[error("Completion response contained no choices")]
    EmptyResponse,

    #[error("Completion request exceeded its deadline")]
    DeadlineExceeded,
}

/// The request URL is dropped: it can carry credentials.
impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::RequestFailed(Box::new(e.without_url()))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Completes `user` under the `system` instruction. Must give up by `deadline`.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        deadline: Instant,
    ) -> Result<String, CompletionError>;
}
