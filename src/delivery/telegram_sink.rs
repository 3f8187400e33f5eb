//! Telegram Bot API `sendMessage` sink.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::config::TelegramConfig;
use crate::delivery::DeliveryError;
use crate::delivery::DeliverySink;

/// Bound on a single `sendMessage` round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramSink {
    pub api_url: String,
    token: String,
    client: reqwest::Client,
}

impl TelegramSink {
    pub fn new(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        let json = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        debug!("Sending message to chat {chat_id}");
        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_url, self.token))
            .header(CONTENT_TYPE, "application/json")
            .body(json.to_string())
            .send()
            .await?;
        let body = response.text().await?;
        let resp: SendMessageResponse = serde_json::from_str(&body)?;

        if !resp.ok {
            return Err(DeliveryError::Rejected {
                chat_id,
                description: resp
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }
}
