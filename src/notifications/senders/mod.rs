use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::models::ChannelConfig;

pub mod slack;
pub mod webhook;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send notification: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// One implementation per channel type. Delivery mechanics stop at the
/// channel's HTTP boundary; anything past it is the channel provider's
/// problem.
#[async_trait]
pub trait NotificationSender {
    /// Sends `message` using the decrypted `config` for this channel.
    /// `context` carries key-value pairs for channels that support body
    /// templating.
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError>;
}
