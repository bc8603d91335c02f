use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_channels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    /// "webhook" or "slack".
    pub channel_type: String,
    /// Encrypted serialized `ChannelConfig`. Never logged.
    #[serde(skip_serializing)]
    pub config_enc: String,
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::alert_rule::Entity> for Entity {
    fn to() -> RelationDef {
        super::alert_rule_channel::Relation::AlertRule.def()
    }

    fn via() -> Option<RelationDef> {
        Some(
            super::alert_rule_channel::Relation::NotificationChannel
                .def()
                .rev(),
        )
    }
}

impl ActiveModelBehavior for ActiveModel {}
