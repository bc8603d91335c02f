//! Service for alert rules, their notification channel links, and the
//! immutable firing history.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::db::entities::{alert_history, alert_rule, alert_rule_channel, prelude::*};
use crate::db::enums::AlertSeverity;

#[derive(Debug, Clone)]
pub struct NewAlertRule {
    pub user_id: i32,
    pub connection_id: Option<i32>,
    pub name: String,
    pub condition_type: String,
    pub comparison_operator: String,
    pub threshold: f64,
    pub unit: String,
    pub time_window_seconds: i32,
    /// Defaults to the evaluation window when not given, which makes the
    /// window double as the re-fire cooldown out of the box.
    pub cooldown_seconds: Option<i32>,
    pub severity: AlertSeverity,
    pub notification_channel_ids: Vec<i32>,
}

pub async fn create_alert_rule(
    db: &DatabaseConnection,
    data: NewAlertRule,
) -> Result<alert_rule::Model, DbErr> {
    let now = Utc::now();
    let cooldown = data.cooldown_seconds.unwrap_or(data.time_window_seconds);

    let new_rule = alert_rule::ActiveModel {
        user_id: Set(data.user_id),
        connection_id: Set(data.connection_id),
        name: Set(data.name),
        condition_type: Set(data.condition_type),
        comparison_operator: Set(data.comparison_operator),
        threshold: Set(data.threshold),
        unit: Set(data.unit),
        time_window_seconds: Set(data.time_window_seconds),
        cooldown_seconds: Set(cooldown),
        severity: Set(data.severity),
        is_active: Set(true),
        last_triggered_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let saved = new_rule.insert(db).await?;
    if !data.notification_channel_ids.is_empty() {
        link_channels_to_rule(db, saved.id, &data.notification_channel_ids).await?;
    }

    Ok(saved)
}

pub async fn link_channels_to_rule(
    db: &DatabaseConnection,
    rule_id: i32,
    channel_ids: &[i32],
) -> Result<(), DbErr> {
    let links = channel_ids
        .iter()
        .map(|channel_id| alert_rule_channel::ActiveModel {
            alert_rule_id: Set(rule_id),
            channel_id: Set(*channel_id),
        });

    AlertRuleChannel::insert_many(links)
        .on_conflict(
            OnConflict::columns([
                alert_rule_channel::Column::AlertRuleId,
                alert_rule_channel::Column::ChannelId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(())
}

pub async fn get_linked_channel_ids(
    db: &DatabaseConnection,
    rule_id: i32,
) -> Result<Vec<i32>, DbErr> {
    let links = AlertRuleChannel::find()
        .filter(alert_rule_channel::Column::AlertRuleId.eq(rule_id))
        .all(db)
        .await?;

    Ok(links.into_iter().map(|l| l.channel_id).collect())
}

pub async fn get_all_active_rules_for_evaluation(
    db: &DatabaseConnection,
) -> Result<Vec<alert_rule::Model>, DbErr> {
    AlertRule::find()
        .filter(alert_rule::Column::IsActive.eq(true))
        .order_by(alert_rule::Column::Id, Order::Asc)
        .all(db)
        .await
}

/// Atomic cooldown claim. Sets `last_triggered_at = now` only if the rule is
/// outside its cooldown; a concurrent evaluator racing on the same rule sees
/// zero rows affected and must not fire. This is the single read-modify-write
/// that prevents duplicate near-simultaneous firings.
pub async fn try_claim_trigger(
    db: &DatabaseConnection,
    rule_id: i32,
    now: DateTime<Utc>,
    cooldown_seconds: i32,
) -> Result<bool, DbErr> {
    let cooldown_start = now - Duration::seconds(cooldown_seconds as i64);

    let result = AlertRule::update_many()
        .col_expr(alert_rule::Column::LastTriggeredAt, Expr::value(now))
        .col_expr(alert_rule::Column::UpdatedAt, Expr::value(now))
        .filter(alert_rule::Column::Id.eq(rule_id))
        .filter(
            Condition::any()
                .add(alert_rule::Column::LastTriggeredAt.is_null())
                .add(alert_rule::Column::LastTriggeredAt.lte(cooldown_start)),
        )
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

pub async fn record_firing(
    db: &DatabaseConnection,
    rule: &alert_rule::Model,
    message: String,
    triggered_at: DateTime<Utc>,
) -> Result<alert_history::Model, DbErr> {
    let entry = alert_history::ActiveModel {
        alert_rule_id: Set(rule.id),
        message: Set(message),
        severity: Set(rule.severity.clone()),
        triggered_at: Set(triggered_at),
        resolved: Set(false),
        resolved_at: Set(None),
        ..Default::default()
    };

    entry.insert(db).await
}

/// Marks any open firing for the rule as resolved. Advisory: called when the
/// condition evaluates false after having fired.
pub async fn resolve_open_firings(
    db: &DatabaseConnection,
    rule_id: i32,
    resolved_at: DateTime<Utc>,
) -> Result<u64, DbErr> {
    let result = AlertHistory::update_many()
        .col_expr(alert_history::Column::Resolved, Expr::value(true))
        .col_expr(alert_history::Column::ResolvedAt, Expr::value(resolved_at))
        .filter(alert_history::Column::AlertRuleId.eq(rule_id))
        .filter(alert_history::Column::Resolved.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

pub async fn get_history_for_rule(
    db: &DatabaseConnection,
    rule_id: i32,
    limit: u64,
) -> Result<Vec<alert_history::Model>, DbErr> {
    AlertHistory::find()
        .filter(alert_history::Column::AlertRuleId.eq(rule_id))
        .order_by(alert_history::Column::TriggeredAt, Order::Desc)
        .limit(limit)
        .all(db)
        .await
}
