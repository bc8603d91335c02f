//! Service for managing monitors: probe definitions bound to a connection.
//!
//! `last_executed_at` is written exclusively through [`mark_executed`], which
//! uses a conditional single-row update so racing scheduler cycles cannot
//! revert each other's timestamps.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set,
};
use thiserror::Error;

use crate::db::entities::{connection, monitor, prelude::*};

#[derive(Error, Debug)]
pub enum MonitorServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Interval of {requested}s is below the {min}s floor for the '{tier}' plan")]
    IntervalBelowFloor {
        requested: i32,
        min: i32,
        tier: String,
    },
    #[error("Monitor {0} not found")]
    NotFound(i32),
    #[error("Connection {0} not found")]
    ConnectionNotFound(i32),
}

/// Resolves the plan tier of the user owning `connection_id` and enforces the
/// interval floor for it.
async fn check_interval_floor(
    db: &DatabaseConnection,
    connection_id: i32,
    interval_seconds: i32,
) -> Result<(), MonitorServiceError> {
    let conn = Connection::find_by_id(connection_id)
        .one(db)
        .await?
        .ok_or(MonitorServiceError::ConnectionNotFound(connection_id))?;
    let tier = User::find_by_id(conn.user_id)
        .one(db)
        .await?
        .map(|u| u.plan_tier)
        .unwrap_or_else(|| "free".to_string());

    let floor = min_interval_seconds_for_tier(&tier);
    if interval_seconds < floor {
        return Err(MonitorServiceError::IntervalBelowFloor {
            requested: interval_seconds,
            min: floor,
            tier,
        });
    }
    Ok(())
}

/// Interval floor in seconds for a billing plan tier. Unknown tiers get the
/// most conservative floor.
pub fn min_interval_seconds_for_tier(plan_tier: &str) -> i32 {
    match plan_tier {
        "pro" => 30,
        "standard" => 60,
        _ => 300,
    }
}

#[derive(Debug, Clone)]
pub struct NewMonitor {
    pub connection_id: i32,
    pub name: String,
    pub path: String,
    pub method: String,
    pub interval_seconds: i32,
    pub timeout_seconds: Option<i32>,
    pub expected_status: Option<i32>,
    pub latency_threshold_ms: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMonitor {
    pub name: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    pub interval_seconds: Option<i32>,
    pub timeout_seconds: Option<i32>,
    pub expected_status: Option<Option<i32>>,
    pub latency_threshold_ms: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

pub async fn create_monitor(
    db: &DatabaseConnection,
    data: NewMonitor,
) -> Result<monitor::Model, MonitorServiceError> {
    check_interval_floor(db, data.connection_id, data.interval_seconds).await?;

    let now = Utc::now();
    let new_monitor = monitor::ActiveModel {
        connection_id: Set(data.connection_id),
        name: Set(data.name),
        path: Set(data.path),
        method: Set(data.method),
        interval_seconds: Set(data.interval_seconds),
        timeout_seconds: Set(data.timeout_seconds.unwrap_or(30)),
        expected_status: Set(data.expected_status),
        latency_threshold_ms: Set(data.latency_threshold_ms),
        is_active: Set(true),
        last_executed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_monitor.insert(db).await?)
}

pub async fn update_monitor(
    db: &DatabaseConnection,
    monitor_id: i32,
    data: UpdateMonitor,
) -> Result<monitor::Model, MonitorServiceError> {
    let existing = Monitor::find_by_id(monitor_id)
        .one(db)
        .await?
        .ok_or(MonitorServiceError::NotFound(monitor_id))?;

    if let Some(interval) = data.interval_seconds {
        check_interval_floor(db, existing.connection_id, interval).await?;
    }

    let mut active: monitor::ActiveModel = existing.into();
    if let Some(name) = data.name {
        active.name = Set(name);
    }
    if let Some(path) = data.path {
        active.path = Set(path);
    }
    if let Some(method) = data.method {
        active.method = Set(method);
    }
    if let Some(interval) = data.interval_seconds {
        active.interval_seconds = Set(interval);
    }
    if let Some(timeout) = data.timeout_seconds {
        active.timeout_seconds = Set(timeout);
    }
    if let Some(expected) = data.expected_status {
        active.expected_status = Set(expected);
    }
    if let Some(threshold) = data.latency_threshold_ms {
        active.latency_threshold_ms = Set(threshold);
    }
    if let Some(is_active) = data.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now());

    Ok(active.update(db).await?)
}

pub async fn get_monitor_by_id(
    db: &DatabaseConnection,
    monitor_id: i32,
) -> Result<Option<monitor::Model>, DbErr> {
    Monitor::find_by_id(monitor_id).one(db).await
}

pub async fn get_monitors_for_connection(
    db: &DatabaseConnection,
    connection_id: i32,
) -> Result<Vec<monitor::Model>, DbErr> {
    Monitor::find()
        .filter(monitor::Column::ConnectionId.eq(connection_id))
        .all(db)
        .await
}

/// Fetches every active monitor together with its owning connection. The due
/// filter itself is pure and lives in the scheduler; this is the population
/// read whose failure is the one hard error of a scheduling cycle.
pub async fn get_due_candidates(
    db: &DatabaseConnection,
) -> Result<Vec<(monitor::Model, connection::Model)>, DbErr> {
    let rows = Monitor::find()
        .filter(monitor::Column::IsActive.eq(true))
        .find_also_related(Connection)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(m, c)| c.map(|c| (m, c)))
        .collect())
}

/// Conditionally stamps `last_executed_at` with the execution start time.
/// The write only lands if it is later than the stored value (or the monitor
/// has never run), so two racing cycles cannot move the timestamp backwards.
/// Returns whether this call won the write.
pub async fn mark_executed(
    db: &DatabaseConnection,
    monitor_id: i32,
    started_at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let result = Monitor::update_many()
        .col_expr(monitor::Column::LastExecutedAt, Expr::value(started_at))
        .filter(monitor::Column::Id.eq(monitor_id))
        .filter(
            Condition::any()
                .add(monitor::Column::LastExecutedAt.is_null())
                .add(monitor::Column::LastExecutedAt.lt(started_at)),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_floor_per_tier() {
        assert_eq!(min_interval_seconds_for_tier("pro"), 30);
        assert_eq!(min_interval_seconds_for_tier("standard"), 60);
        assert_eq!(min_interval_seconds_for_tier("free"), 300);
        assert_eq!(min_interval_seconds_for_tier("something-else"), 300);
    }
}
