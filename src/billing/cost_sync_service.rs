//! Cost aggregation: reconciles provider-reported usage into CostMetric
//! rows.
//!
//! Sync runs on its own cadence, independent of health checks. Writes are
//! keyed by (connection, period, transaction id), so replaying a period is a
//! no-op rather than a duplicate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info, warn};

use crate::db::entities::connection;
use crate::db::services::connection_service::{self, ConnectionServiceError};
use crate::db::services::cost_service::{self, NewCostMetric};
use crate::monitoring::auth::AuthError;
use crate::monitoring::executor::join_url;

const SYNC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Credential error: {0}")]
    Credentials(#[from] ConnectionServiceError),
    #[error("Auth header error: {0}")]
    Auth(#[from] AuthError),
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned status {0}")]
    ProviderStatus(u16),
}

/// Usage report as returned by a provider's billing endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub billing_period: String,
    pub records: Vec<UsageRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSyncData {
    pub period: String,
    pub records_fetched: usize,
    pub records_written: usize,
    pub total_amount: Decimal,
    pub currency: Option<String>,
}

/// Per-connection sync result: `{success, costData?, error?}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSyncOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_data: Option<CostSyncData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Billing endpoint path by provider tag. Providers with bespoke billing
/// APIs get their own arm; everything else uses the common path.
pub fn usage_endpoint_path(provider: &str) -> &'static str {
    match provider {
        "openai" => "/v1/usage",
        "anthropic" => "/v1/organizations/usage_report",
        "stripe" => "/v1/billing/meter_event_summaries",
        _ => "/usage",
    }
}

pub struct CostSyncService {
    db: DatabaseConnection,
    client: Client,
    encryption_key_hex: String,
}

impl CostSyncService {
    pub fn new(db: DatabaseConnection, encryption_key_hex: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            db,
            client,
            encryption_key_hex,
        })
    }

    pub async fn start_periodic_sync(self: Arc<Self>, period_seconds: u64) {
        info!(
            interval_seconds = period_seconds,
            "Cost sync service started."
        );
        let mut ticker = interval(TokioDuration::from_secs(period_seconds));
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_sync_cycle().await {
                error!(error = %e, "Error during cost sync cycle.");
            }
        }
    }

    /// Syncs every active cost-tracking connection. A failing provider is
    /// reported in its own outcome and never blocks the others; only the
    /// population read is a hard error.
    pub async fn run_sync_cycle(&self) -> Result<Vec<(i32, CostSyncOutcome)>, SyncError> {
        let connections =
            connection_service::get_active_cost_tracking_connections(&self.db).await?;
        info!(count = connections.len(), "Connections to cost-sync.");

        let mut outcomes = Vec::with_capacity(connections.len());
        for conn in connections {
            let outcome = self.sync_connection_costs(&conn).await;
            if outcome.success {
                info!(connection_id = conn.id, provider = %conn.provider, "Cost sync succeeded.");
            } else {
                warn!(
                    connection_id = conn.id,
                    provider = %conn.provider,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Cost sync failed."
                );
            }
            outcomes.push((conn.id, outcome));
        }

        Ok(outcomes)
    }

    /// Syncs one connection. Never returns an error; failures are folded into
    /// the outcome so the caller can surface them per connection.
    pub async fn sync_connection_costs(&self, conn: &connection::Model) -> CostSyncOutcome {
        match self.fetch_and_reconcile(conn).await {
            Ok(data) => CostSyncOutcome {
                success: true,
                cost_data: Some(data),
                error: None,
            },
            Err(e) => CostSyncOutcome {
                success: false,
                cost_data: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn fetch_and_reconcile(
        &self,
        conn: &connection::Model,
    ) -> Result<CostSyncData, SyncError> {
        let auth = connection_service::decrypt_credentials(conn, &self.encryption_key_hex)?;
        let headers = auth.build_auth_headers()?;

        let url = join_url(&conn.base_url, usage_endpoint_path(&conn.provider));
        let response = self
            .client
            .get(&url)
            .headers(headers)
            .timeout(SYNC_REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::ProviderStatus(status.as_u16()));
        }

        let report: UsageReport = response.json().await?;

        let mut records_written = 0usize;
        let mut total_amount = Decimal::ZERO;
        let currency = report.records.first().map(|r| r.currency.clone());

        for record in &report.records {
            total_amount += record.amount;

            let inserted = cost_service::upsert_cost_metric(
                &self.db,
                NewCostMetric {
                    connection_id: conn.id,
                    amount: record.amount,
                    currency: record.currency.clone(),
                    period: report.billing_period.clone(),
                    transaction_id: record.transaction_id.clone(),
                    source_timestamp: record.occurred_at,
                    metadata: record.metadata.clone(),
                },
            )
            .await?;

            if inserted {
                records_written += 1;
            }
        }

        Ok(CostSyncData {
            period: report.billing_period,
            records_fetched: report.records.len(),
            records_written,
            total_amount,
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_report_parses_camel_case() {
        let json = r#"{
            "billingPeriod": "2026-08",
            "records": [
                {
                    "transactionId": "txn_001",
                    "amount": "12.34",
                    "currency": "USD",
                    "occurredAt": "2026-08-01T00:00:00Z",
                    "metadata": {"model": "large"}
                },
                {
                    "transactionId": "txn_002",
                    "amount": "0.66",
                    "currency": "USD",
                    "occurredAt": "2026-08-02T00:00:00Z"
                }
            ]
        }"#;

        let report: UsageReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.billing_period, "2026-08");
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].transaction_id, "txn_001");
        assert_eq!(report.records[0].amount, Decimal::new(1234, 2));
        assert!(report.records[1].metadata.is_none());

        let total: Decimal = report.records.iter().map(|r| r.amount).sum();
        assert_eq!(total, Decimal::new(1300, 2));
    }

    #[test]
    fn test_usage_endpoint_path_per_provider() {
        assert_eq!(usage_endpoint_path("openai"), "/v1/usage");
        assert_eq!(usage_endpoint_path("unknown-provider"), "/usage");
    }

    #[test]
    fn test_sync_outcome_serialization() {
        let outcome = CostSyncOutcome {
            success: false,
            cost_data: None,
            error: Some("provider returned status 503".to_string()),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("costData").is_none());
        assert_eq!(json["error"], "provider returned status 503");
    }
}
