use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub connection_id: i32,
    pub name: String,
    /// Request path appended to the connection's base URL.
    pub path: String,
    pub method: String,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    /// When set, only this exact status code counts as SUCCESS.
    pub expected_status: Option<i32>,
    pub latency_threshold_ms: Option<i32>,
    pub is_active: bool,
    /// Stamped by the scheduling engine with the execution start time of each
    /// attempt, success or failure. Never written by user action.
    pub last_executed_at: Option<ChronoDateTimeUtc>,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::connection::Entity",
        from = "Column::ConnectionId",
        to = "super::connection::Column::Id",
        on_delete = "Cascade"
    )]
    Connection,
    #[sea_orm(has_many = "super::check_result::Entity")]
    CheckResult,
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl Related<super::check_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
