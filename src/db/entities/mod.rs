//! SeaORM entities mapping the engine's tables.
//!
//! Each entity lives in its own module; the `prelude` re-exports the common
//! aliases so services can import everything in one line.

pub mod alert_history;
pub mod alert_rule;
pub mod alert_rule_channel;
pub mod check_result;
pub mod connection;
pub mod cost_metric;
pub mod monitor;
pub mod notification_channel;
pub mod user;

pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;

    pub use super::connection::Entity as Connection;
    pub use super::connection::Model as ConnectionModel;

    pub use super::monitor::Entity as Monitor;
    pub use super::monitor::Model as MonitorModel;

    pub use super::check_result::Entity as CheckResult;
    pub use super::check_result::Model as CheckResultModel;

    pub use super::alert_rule::Entity as AlertRule;
    pub use super::alert_rule::Model as AlertRuleModel;

    pub use super::alert_history::Entity as AlertHistory;
    pub use super::alert_history::Model as AlertHistoryModel;

    pub use super::alert_rule_channel::Entity as AlertRuleChannel;
    pub use super::alert_rule_channel::Model as AlertRuleChannelModel;

    pub use super::notification_channel::Entity as NotificationChannel;
    pub use super::notification_channel::Model as NotificationChannelModel;

    pub use super::cost_metric::Entity as CostMetric;
    pub use super::cost_metric::Model as CostMetricModel;
}
