use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::AlertSeverity;

/// Immutable record of one alert firing. `resolved` is advisory and may be
/// flipped once when the condition clears.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alert_histories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub alert_rule_id: i32,
    pub message: String,
    pub severity: AlertSeverity,
    pub triggered_at: ChronoDateTimeUtc,
    pub resolved: bool,
    pub resolved_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::alert_rule::Entity",
        from = "Column::AlertRuleId",
        to = "super::alert_rule::Column::Id",
        on_delete = "Cascade"
    )]
    AlertRule,
}

impl Related<super::alert_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AlertRule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
