use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-channel delivery configuration. Serialized to JSON and sealed with the
/// credential vault before it is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelConfig {
    Webhook {
        url: String,
        method: String, // "GET" or "POST"
        headers: Option<HashMap<String, String>>,
        /// Optional JSON body template rendered with the alert context.
        body_template: Option<String>,
    },
    Slack {
        webhook_url: String,
        channel: Option<String>,
    },
}

/// Request body for creating a notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannelRequest {
    pub name: String,
    pub channel_type: String,
    pub config: serde_json::Value,
}

/// Channel summary exposed to callers. Excludes the sensitive config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub id: i32,
    pub name: String,
    pub channel_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_tagged_roundtrip() {
        let config = ChannelConfig::Slack {
            webhook_url: "https://hooks.slack.com/services/T/B/X".to_string(),
            channel: Some("#oncall".to_string()),
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""type":"slack""#));

        let back: ChannelConfig = serde_json::from_str(&json).unwrap();
        match back {
            ChannelConfig::Slack { channel, .. } => assert_eq!(channel.as_deref(), Some("#oncall")),
            _ => panic!("wrong variant"),
        }
    }
}
