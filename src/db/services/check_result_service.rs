//! Access layer for the append-only CheckResult ledger.
//!
//! Rows are inserted once and never updated; the only deletion path is
//! retention pruning. Consumers read most-recent-first.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;

use crate::db::entities::{check_result, monitor, prelude::*};
use crate::db::enums::CheckStatus;

#[derive(Debug, Clone)]
pub struct NewCheckResult {
    pub monitor_id: i32,
    pub status: CheckStatus,
    pub http_status: Option<i32>,
    pub latency_ms: i64,
    pub response_size_bytes: Option<i64>,
    pub error_detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub async fn record_result(
    db: &DatabaseConnection,
    data: NewCheckResult,
) -> Result<check_result::Model, DbErr> {
    let new_result = check_result::ActiveModel {
        monitor_id: Set(data.monitor_id),
        status: Set(data.status),
        http_status: Set(data.http_status),
        latency_ms: Set(data.latency_ms),
        response_size_bytes: Set(data.response_size_bytes),
        error_detail: Set(data.error_detail),
        checked_at: Set(data.checked_at),
        ..Default::default()
    };

    new_result.insert(db).await
}

/// Most-recent-first history for one monitor, for dashboards and charts.
pub async fn get_recent_results(
    db: &DatabaseConnection,
    monitor_id: i32,
    limit: u64,
) -> Result<Vec<check_result::Model>, DbErr> {
    CheckResult::find()
        .filter(check_result::Column::MonitorId.eq(monitor_id))
        .order_by(check_result::Column::CheckedAt, Order::Desc)
        .limit(limit)
        .all(db)
        .await
}

pub async fn get_latest_result(
    db: &DatabaseConnection,
    monitor_id: i32,
) -> Result<Option<check_result::Model>, DbErr> {
    CheckResult::find()
        .filter(check_result::Column::MonitorId.eq(monitor_id))
        .order_by(check_result::Column::CheckedAt, Order::Desc)
        .one(db)
        .await
}

/// Fetches all results for the given monitors inside `[start, end]`, used by
/// alert evaluation.
pub async fn get_results_in_window(
    db: &DatabaseConnection,
    monitor_ids: &[i32],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<check_result::Model>, DbErr> {
    if monitor_ids.is_empty() {
        return Ok(Vec::new());
    }

    CheckResult::find()
        .filter(check_result::Column::MonitorId.is_in(monitor_ids.to_vec()))
        .filter(check_result::Column::CheckedAt.gte(start))
        .filter(check_result::Column::CheckedAt.lte(end))
        .order_by(check_result::Column::CheckedAt, Order::Desc)
        .all(db)
        .await
}

/// Retention pruning: drops results older than the cutoff. Returns the number
/// of rows removed.
pub async fn prune_results_older_than(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = CheckResult::delete_many()
        .filter(check_result::Column::CheckedAt.lt(cutoff))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Serialized monitor snapshot consumed by the presentation layer. A monitor
/// that has never executed surfaces as `pending` rather than an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorOverview {
    pub monitor_id: i32,
    pub name: String,
    pub status: String,
    pub http_status: Option<i32>,
    pub latency_ms: Option<i64>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

pub async fn get_monitor_overviews_for_connection(
    db: &DatabaseConnection,
    connection_id: i32,
) -> Result<Vec<MonitorOverview>, DbErr> {
    let monitors = Monitor::find()
        .filter(monitor::Column::ConnectionId.eq(connection_id))
        .all(db)
        .await?;

    let mut overviews = Vec::with_capacity(monitors.len());
    for m in monitors {
        let latest = get_latest_result(db, m.id).await?;
        overviews.push(match latest {
            Some(r) => MonitorOverview {
                monitor_id: m.id,
                name: m.name,
                status: r.status.to_string(),
                http_status: r.http_status,
                latency_ms: Some(r.latency_ms),
                last_checked_at: Some(r.checked_at),
            },
            None => MonitorOverview {
                monitor_id: m.id,
                name: m.name,
                status: "pending".to_string(),
                http_status: None,
                latency_ms: None,
                last_checked_at: None,
            },
        });
    }

    Ok(overviews)
}
