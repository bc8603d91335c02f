//! The `services` module is the query layer over the entities. It
//! encapsulates all SeaORM logic so the engine components (scheduler,
//! evaluator, cost sync) work with domain models without touching the schema
//! directly.
//!
//! Each sub-module owns one aggregate; public functions are re-exported here
//! for access under `crate::db::services::*`.

pub mod alert_service;
pub mod check_result_service;
pub mod connection_service;
pub mod cost_service;
pub mod monitor_service;

pub use alert_service::*;
pub use check_result_service::*;
pub use connection_service::*;
pub use cost_service::*;
pub use monitor_service::*;
