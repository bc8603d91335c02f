use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;

use super::{NotificationSender, SenderError};
use crate::notifications::models::ChannelConfig;

/// Delivers notifications through a Slack incoming webhook.
pub struct SlackSender {
    client: Client,
}

impl Default for SlackSender {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackSender {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(
        &self,
        config: &ChannelConfig,
        message: &str,
        _context: &HashMap<String, String>,
    ) -> Result<(), SenderError> {
        let (webhook_url, channel) = match config {
            ChannelConfig::Slack {
                webhook_url,
                channel,
            } => (webhook_url, channel),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "Expected Slack config, but found a different type.".to_string(),
                ));
            }
        };

        let payload = SlackMessage {
            text: message,
            channel: channel.as_deref(),
        };

        let response = self.client.post(webhook_url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "Slack webhook returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slack_payload_shape() {
        let payload = SlackMessage {
            text: "ALERT! Something happened.",
            channel: Some("#oncall"),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["text"], "ALERT! Something happened.");
        assert_eq!(json["channel"], "#oncall");

        let bare = SlackMessage {
            text: "hi",
            channel: None,
        };
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("channel").is_none());
    }
}
