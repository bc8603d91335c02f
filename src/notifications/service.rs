use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use thiserror::Error;
use tracing::{error, info};

use super::models::{ChannelConfig, ChannelResponse, CreateChannelRequest};
use super::senders::{slack::SlackSender, webhook::WebhookSender, NotificationSender, SenderError};
use crate::db::entities::{notification_channel, prelude::*};
use crate::db::services::alert_service;
use crate::services::encryption_service::{self, EncryptionError};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),
    #[error("Encryption error: {0}")]
    EncryptionError(#[from] EncryptionError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Channel not found: {0}")]
    NotFound(i32),
    #[error("Unsupported channel type: {0}")]
    UnsupportedChannel(String),
    #[error("Sender error: {0}")]
    SenderError(#[from] SenderError),
}

/// Loads channels, decrypts their configuration, and dispatches messages to
/// the matching sender. Channel configs live encrypted at rest under the same
/// vault as connection credentials.
pub struct NotificationService {
    db: DatabaseConnection,
    encryption_key_hex: String,
}

impl NotificationService {
    pub fn new(db: DatabaseConnection, encryption_key_hex: String) -> Self {
        Self {
            db,
            encryption_key_hex,
        }
    }

    pub async fn create_channel(
        &self,
        user_id: i32,
        payload: CreateChannelRequest,
    ) -> Result<ChannelResponse, NotificationError> {
        // Parse through the enum so invalid configs are rejected before they
        // are sealed.
        let config: ChannelConfig = serde_json::from_value(payload.config)?;
        let config_enc =
            encryption_service::encrypt(&serde_json::to_string(&config)?, &self.encryption_key_hex)?;

        let now = Utc::now();
        let channel = notification_channel::ActiveModel {
            user_id: Set(user_id),
            name: Set(payload.name),
            channel_type: Set(payload.channel_type),
            config_enc: Set(config_enc),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(ChannelResponse {
            id: channel.id,
            name: channel.name,
            channel_type: channel.channel_type,
        })
    }

    /// Sends one message to one channel.
    pub async fn send_notification(
        &self,
        channel_id: i32,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), NotificationError> {
        let channel = NotificationChannel::find_by_id(channel_id)
            .one(&self.db)
            .await?
            .ok_or(NotificationError::NotFound(channel_id))?;

        let decrypted = encryption_service::decrypt(&channel.config_enc, &self.encryption_key_hex)?;
        let config: ChannelConfig = serde_json::from_str(&decrypted)?;

        match channel.channel_type.as_str() {
            "webhook" => {
                let sender = WebhookSender::new();
                sender.send(&config, message, context).await?;
            }
            "slack" => {
                let sender = SlackSender::new();
                sender.send(&config, message, context).await?;
            }
            _ => return Err(NotificationError::UnsupportedChannel(channel.channel_type)),
        }

        Ok(())
    }

    /// Fans an alert message out to every channel linked to the rule. One
    /// channel failing does not stop delivery to the others; the last failure
    /// is reported once all channels have been attempted.
    pub async fn send_notifications_for_alert_rule(
        &self,
        rule_id: i32,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), NotificationError> {
        let channel_ids = alert_service::get_linked_channel_ids(&self.db, rule_id).await?;

        if channel_ids.is_empty() {
            info!(rule_id, "No notification channels linked to alert rule.");
            return Ok(());
        }

        let mut last_error: Option<NotificationError> = None;
        for channel_id in channel_ids {
            match self.send_notification(channel_id, message, context).await {
                Ok(_) => {
                    info!(rule_id, channel_id, "Alert notification delivered.");
                }
                Err(e) => {
                    error!(rule_id, channel_id, error = %e, "Alert notification failed.");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
