//! Service for reconciled billing data points.
//!
//! Writes are idempotent: the unique (connection, period, transaction_id)
//! key plus a conflict-do-nothing insert means re-running a sync for an
//! already-reconciled period changes nothing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter, QueryOrder, Set,
};

use crate::db::entities::{cost_metric, prelude::*};

#[derive(Debug, Clone)]
pub struct NewCostMetric {
    pub connection_id: i32,
    pub amount: Decimal,
    pub currency: String,
    pub period: String,
    pub transaction_id: String,
    pub source_timestamp: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// Upserts one cost metric. Returns whether a new row was actually written;
/// `false` means the (connection, period, transaction_id) triple was already
/// reconciled.
pub async fn upsert_cost_metric(
    db: &DatabaseConnection,
    data: NewCostMetric,
) -> Result<bool, DbErr> {
    let new_metric = cost_metric::ActiveModel {
        connection_id: Set(data.connection_id),
        amount: Set(data.amount),
        currency: Set(data.currency),
        period: Set(data.period),
        transaction_id: Set(data.transaction_id),
        source_timestamp: Set(data.source_timestamp),
        metadata: Set(data.metadata),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let rows = CostMetric::insert(new_metric)
        .on_conflict(
            OnConflict::columns([
                cost_metric::Column::ConnectionId,
                cost_metric::Column::Period,
                cost_metric::Column::TransactionId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

pub async fn get_costs_for_connection(
    db: &DatabaseConnection,
    connection_id: i32,
) -> Result<Vec<cost_metric::Model>, DbErr> {
    CostMetric::find()
        .filter(cost_metric::Column::ConnectionId.eq(connection_id))
        .order_by(cost_metric::Column::SourceTimestamp, Order::Desc)
        .all(db)
        .await
}

/// Total reconciled spend for one connection and billing period.
pub async fn get_period_total(
    db: &DatabaseConnection,
    connection_id: i32,
    period: &str,
) -> Result<Decimal, DbErr> {
    let metrics = CostMetric::find()
        .filter(cost_metric::Column::ConnectionId.eq(connection_id))
        .filter(cost_metric::Column::Period.eq(period))
        .all(db)
        .await?;

    Ok(metrics.iter().map(|m| m.amount).sum())
}
