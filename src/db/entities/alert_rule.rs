use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::AlertSeverity;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_rules")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    /// None means the rule is global: it is evaluated against every active
    /// connection the user owns.
    pub connection_id: Option<i32>,
    pub name: String,
    /// "error_rate", "response_time", "uptime" or "rate_limit_429".
    pub condition_type: String,
    pub comparison_operator: String,
    pub threshold: f64,
    /// Display unit for the threshold, e.g. "percent" or "ms".
    pub unit: String,
    /// Evaluation lookback window.
    pub time_window_seconds: i32,
    /// Re-fire suppression, independent from the lookback window.
    pub cooldown_seconds: i32,
    pub severity: AlertSeverity,
    pub is_active: bool,
    pub last_triggered_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::connection::Entity",
        from = "Column::ConnectionId",
        to = "super::connection::Column::Id",
        on_delete = "Cascade"
    )]
    Connection,
    #[sea_orm(has_many = "super::alert_history::Entity")]
    AlertHistory,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl Related<super::alert_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertHistory.def()
    }
}

impl Related<super::notification_channel::Entity> for Entity {
    fn to() -> RelationDef {
        super::alert_rule_channel::Relation::NotificationChannel.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::alert_rule_channel::Relation::AlertRule.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
