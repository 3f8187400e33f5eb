//! Outbound message delivery.

use async_trait::async_trait;

pub mod telegram_sink;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to parse API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Chat {chat_id} rejected message: {description}")]
    Rejected { chat_id: i64, description: String },
}

/// The request URL is dropped: it can carry credentials.
impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::RequestFailed(Box::new(e.without_url()))
    }
}

/// Sends one text message to one chat.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}
