use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    /// Provider tag, e.g. "openai", "anthropic", "stripe".
    pub provider: String,
    pub base_url: String,
    /// Auth scheme tag for display purposes only ("bearer", "basic",
    /// "custom_header"). The authoritative auth material lives inside the
    /// encrypted bundle.
    pub auth_type: String,
    /// AEAD envelope (`iv:authTag:ciphertext`, hex segments). Never logged.
    #[serde(skip_serializing)]
    pub credentials_enc: String,
    pub is_active: bool,
    pub cost_tracking_enabled: bool,
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
    #[sea_orm(has_many = "super::monitor::Entity")]
    Monitor,
    #[sea_orm(has_many = "super::cost_metric::Entity")]
    CostMetric,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::monitor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Monitor.def()
    }
}

impl Related<super::cost_metric::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostMetric.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
