//! Discord REST transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::TransportConfig;

use super::{ChatTransport, TransportError};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// Posts pages as bot messages via `POST /channels/{id}/messages`.
#[derive(Debug, Clone)]
pub struct DiscordTransport {
    client: Client,
    base_url: String,
    token: String,
}

impl DiscordTransport {
    /// Create a transport for the given API base URL and bot token.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Client` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    /// Create a transport reading the token from the configured env var.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::MissingToken` if the variable is not set.
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| TransportError::MissingToken(config.token_env.clone()))?;
        Self::new(config.base_url.clone(), token)
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!(
            "{}/channels/{channel_id}/messages",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(self.messages_url(channel_id))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&CreateMessage { content: text })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
