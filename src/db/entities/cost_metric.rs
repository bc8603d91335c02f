use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One reconciled billing data point. At most one row exists per
/// (connection, period, provider transaction id); reconciliation upserts
/// with conflict-do-nothing.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cost_metrics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub connection_id: i32,
    pub amount: Decimal,
    pub currency: String,
    /// Billing period label as reported by the provider, e.g. "2026-08".
    pub period: String,
    /// Provider-supplied idempotency key within the period.
    pub transaction_id: String,
    pub source_timestamp: ChronoDateTimeUtc,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
    pub created_at: ChronoDateTimeUtc,
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
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
