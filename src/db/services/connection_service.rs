//! Service for managing connections: user-owned external API integrations
//! with encrypted credential bundles.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use thiserror::Error;

use crate::db::entities::{connection, prelude::*};
use crate::monitoring::auth::ProviderAuth;
use crate::services::encryption_service::{self, EncryptionError};

#[derive(Error, Debug)]
pub enum ConnectionServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),
    #[error("Credential serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Connection {0} not found")]
    NotFound(i32),
}

#[derive(Debug, Clone)]
pub struct NewConnection {
    pub user_id: i32,
    pub name: String,
    pub provider: String,
    pub base_url: String,
    pub auth: ProviderAuth,
    pub cost_tracking_enabled: bool,
}

/// Creates a connection, sealing the credential bundle before it touches the
/// database. The plaintext auth material never leaves this function.
pub async fn create_connection(
    db: &DatabaseConnection,
    encryption_key_hex: &str,
    data: NewConnection,
) -> Result<connection::Model, ConnectionServiceError> {
    let auth_type = data.auth.kind().to_string();
    let credentials_json = serde_json::to_string(&data.auth)?;
    let credentials_enc = encryption_service::encrypt(&credentials_json, encryption_key_hex)?;

    let now = Utc::now();
    let new_connection = connection::ActiveModel {
        user_id: Set(data.user_id),
        name: Set(data.name),
        provider: Set(data.provider),
        base_url: Set(data.base_url),
        auth_type: Set(auth_type),
        credentials_enc: Set(credentials_enc),
        is_active: Set(true),
        cost_tracking_enabled: Set(data.cost_tracking_enabled),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_connection.insert(db).await?)
}

pub async fn get_connection_by_id(
    db: &DatabaseConnection,
    connection_id: i32,
) -> Result<Option<connection::Model>, DbErr> {
    Connection::find_by_id(connection_id).one(db).await
}

/// Cheap activity probe used by the scheduler to re-check a connection right
/// before executing a monitor selected earlier in the cycle.
pub async fn is_connection_active(
    db: &DatabaseConnection,
    connection_id: i32,
) -> Result<bool, DbErr> {
    let conn = Connection::find_by_id(connection_id).one(db).await?;
    Ok(conn.map(|c| c.is_active).unwrap_or(false))
}

pub async fn get_active_connections_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<connection::Model>, DbErr> {
    Connection::find()
        .filter(connection::Column::UserId.eq(user_id))
        .filter(connection::Column::IsActive.eq(true))
        .all(db)
        .await
}

pub async fn get_active_cost_tracking_connections(
    db: &DatabaseConnection,
) -> Result<Vec<connection::Model>, DbErr> {
    Connection::find()
        .filter(connection::Column::IsActive.eq(true))
        .filter(connection::Column::CostTrackingEnabled.eq(true))
        .all(db)
        .await
}

pub async fn set_connection_active(
    db: &DatabaseConnection,
    connection_id: i32,
    is_active: bool,
) -> Result<connection::Model, ConnectionServiceError> {
    let conn = Connection::find_by_id(connection_id)
        .one(db)
        .await?
        .ok_or(ConnectionServiceError::NotFound(connection_id))?;

    let mut active: connection::ActiveModel = conn.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Deletes a connection; monitors and their results cascade via foreign keys.
pub async fn delete_connection(
    db: &DatabaseConnection,
    connection_id: i32,
) -> Result<(), ConnectionServiceError> {
    let result = Connection::delete_by_id(connection_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(ConnectionServiceError::NotFound(connection_id));
    }
    Ok(())
}

/// Decrypts a connection's credential bundle back into its auth variant.
/// Failures surface as typed errors; callers classify them as ERROR outcomes
/// rather than crashing a batch.
pub fn decrypt_credentials(
    conn: &connection::Model,
    encryption_key_hex: &str,
) -> Result<ProviderAuth, ConnectionServiceError> {
    let plaintext = encryption_service::decrypt(&conn.credentials_enc, encryption_key_hex)?;
    Ok(serde_json::from_str(&plaintext)?)
}
