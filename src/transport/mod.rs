//! Outbound chat transports.
//!
//! The sender hands each page to a [`ChatTransport`]. Delivery is
//! best-effort: transports do not retry.

mod discord;

pub use discord::*;

use async_trait::async_trait;

/// Errors from transport operations.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("Bot token not configured (env: {0})")]
    MissingToken(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Destination for relayed chat pages.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver one message to a channel.
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), TransportError>;
}

/// Transport that only writes pages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl ChatTransport for LogTransport {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), TransportError> {
        tracing::info!(channel = %channel_id, chars = text.chars().count(), "{text}");
        Ok(())
    }
}
