//! Alert evaluation: consumes the CheckResult ledger per rule, applies
//! cooldown, and emits notifications through the linked channels.
//!
//! Each rule moves through `ARMED -> FIRED(cooldown) -> ARMED`. The FIRED
//! transition is guarded by an atomic conditional update on
//! `last_triggered_at`, so two evaluators racing on the same window cannot
//! both fire.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};

use crate::db::entities::{alert_rule, check_result, connection};
use crate::db::enums::CheckStatus;
use crate::db::services::{alert_service, check_result_service, connection_service, monitor_service};
use crate::notifications::service::{NotificationError, NotificationService};

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Database query error: {0}")]
    DatabaseError(#[from] DbErr),
    #[error("Notification error: {0}")]
    NotificationError(#[from] NotificationError),
    #[error("Connection {0} referenced by rule no longer exists")]
    ConnectionNotFound(i32),
}

// Distinguishes "condition evaluated false" from "not enough data": only an
// actual false evaluation may resolve an open firing.
enum RuleEvaluation {
    Triggered(String),
    ConditionFalse,
    Skipped,
}

pub struct EvaluationService {
    db: DatabaseConnection,
    notification_service: Arc<NotificationService>,
}

impl EvaluationService {
    pub fn new(db: DatabaseConnection, notification_service: Arc<NotificationService>) -> Self {
        Self {
            db,
            notification_service,
        }
    }

    pub async fn start_periodic_evaluation(self: Arc<Self>, period_seconds: u64) {
        info!(
            interval_seconds = period_seconds,
            "Alert evaluation service started."
        );
        let mut ticker = interval(TokioDuration::from_secs(period_seconds));
        loop {
            ticker.tick().await;
            debug!("Running alert evaluation cycle...");
            if let Err(e) = self.run_evaluation_cycle().await {
                error!(error = %e, "Error during alert evaluation cycle.");
            }
        }
    }

    /// Evaluates every active rule. Per-rule failures are logged and never
    /// block sibling rules.
    pub async fn run_evaluation_cycle(&self) -> Result<(), EvaluationError> {
        let active_rules = alert_service::get_all_active_rules_for_evaluation(&self.db).await?;
        debug!(count = active_rules.len(), "Active rules to evaluate.");

        for rule in active_rules {
            match self.evaluate_rule(&rule).await {
                Ok(RuleEvaluation::Triggered(message)) => {
                    if let Err(e) = self.fire_rule(&rule, message).await {
                        error!(rule_id = rule.id, rule_name = %rule.name, error = %e, "Failed to fire alert rule.");
                    }
                }
                Ok(RuleEvaluation::ConditionFalse) => {
                    if let Err(e) =
                        alert_service::resolve_open_firings(&self.db, rule.id, Utc::now()).await
                    {
                        warn!(rule_id = rule.id, error = %e, "Failed to resolve open firings.");
                    }
                }
                Ok(RuleEvaluation::Skipped) => {}
                Err(e) => {
                    error!(rule_id = rule.id, rule_name = %rule.name, error = %e, "Error evaluating rule.");
                }
            }
        }

        Ok(())
    }

    async fn evaluate_rule(
        &self,
        rule: &alert_rule::Model,
    ) -> Result<RuleEvaluation, EvaluationError> {
        let now = Utc::now();

        // Cheap pre-check; the authoritative guard is the atomic claim at
        // fire time.
        if in_cooldown(rule.last_triggered_at, now, rule.cooldown_seconds) {
            debug!(
                rule_id = rule.id,
                rule_name = %rule.name,
                cooldown_seconds = rule.cooldown_seconds,
                "Rule is in cooldown."
            );
            return Ok(RuleEvaluation::Skipped);
        }

        if let Some(connection_id) = rule.connection_id {
            let conn = connection_service::get_connection_by_id(&self.db, connection_id)
                .await?
                .ok_or(EvaluationError::ConnectionNotFound(connection_id))?;
            self.evaluate_rule_for_connection(rule, &conn, now).await
        } else {
            // Global rule: every active connection of the owner; the first
            // connection whose window matches fires the rule.
            let connections =
                connection_service::get_active_connections_for_user(&self.db, rule.user_id).await?;

            if connections.is_empty() {
                debug!(rule_id = rule.id, user_id = rule.user_id, "No connections to evaluate global rule against.");
                return Ok(RuleEvaluation::Skipped);
            }

            let mut any_false = false;
            for conn in connections {
                match self.evaluate_rule_for_connection(rule, &conn, now).await {
                    Ok(RuleEvaluation::Triggered(message)) => {
                        return Ok(RuleEvaluation::Triggered(message));
                    }
                    Ok(RuleEvaluation::ConditionFalse) => any_false = true,
                    Ok(RuleEvaluation::Skipped) => {}
                    Err(e) => {
                        error!(rule_id = rule.id, connection_id = conn.id, error = %e, "Error evaluating global rule for connection.");
                    }
                }
            }

            if any_false {
                Ok(RuleEvaluation::ConditionFalse)
            } else {
                Ok(RuleEvaluation::Skipped)
            }
        }
    }

    async fn evaluate_rule_for_connection(
        &self,
        rule: &alert_rule::Model,
        conn: &connection::Model,
        now: DateTime<Utc>,
    ) -> Result<RuleEvaluation, EvaluationError> {
        let monitors = monitor_service::get_monitors_for_connection(&self.db, conn.id).await?;
        let monitor_ids: Vec<i32> = monitors.iter().map(|m| m.id).collect();

        let window_start = now - ChronoDuration::seconds(rule.time_window_seconds as i64);
        let results =
            check_result_service::get_results_in_window(&self.db, &monitor_ids, window_start, now)
                .await?;

        // Never fire on insufficient evidence.
        if results.is_empty() {
            return Ok(RuleEvaluation::Skipped);
        }

        let Some(value) = compute_condition_metric(&rule.condition_type, &results) else {
            warn!(
                rule_id = rule.id,
                condition_type = %rule.condition_type,
                "Unsupported condition type; skipping rule."
            );
            return Ok(RuleEvaluation::Skipped);
        };

        let Some(condition_met) = compare_threshold(&rule.comparison_operator, value, rule.threshold)
        else {
            warn!(
                rule_id = rule.id,
                operator = %rule.comparison_operator,
                "Unsupported comparison operator; skipping rule."
            );
            return Ok(RuleEvaluation::Skipped);
        };

        if condition_met {
            let message = format!(
                "ALERT! Rule '{}' triggered for connection '{}' (ID: {}): {} {} {}{} (current: {:.2}) over the last {} seconds.",
                rule.name,
                conn.name,
                conn.id,
                rule.condition_type,
                rule.comparison_operator,
                rule.threshold,
                rule.unit,
                value,
                rule.time_window_seconds,
            );
            Ok(RuleEvaluation::Triggered(message))
        } else {
            Ok(RuleEvaluation::ConditionFalse)
        }
    }

    /// FIRED transition: claim the cooldown atomically, then record history
    /// and notify. Losing the claim means another evaluator fired this rule
    /// in the same window.
    async fn fire_rule(
        &self,
        rule: &alert_rule::Model,
        message: String,
    ) -> Result<(), EvaluationError> {
        let now = Utc::now();

        let claimed =
            alert_service::try_claim_trigger(&self.db, rule.id, now, rule.cooldown_seconds).await?;
        if !claimed {
            debug!(
                rule_id = rule.id,
                "Lost trigger claim; another evaluation already fired this rule."
            );
            return Ok(());
        }

        info!(rule_id = rule.id, rule_name = %rule.name, "Alert rule triggered. Sending notifications.");

        alert_service::record_firing(&self.db, rule, message.clone(), now).await?;

        let mut context = HashMap::new();
        context.insert("rule_name".to_string(), rule.name.clone());
        context.insert("severity".to_string(), rule.severity.to_string());
        context.insert("message".to_string(), message.clone());

        if let Err(e) = self
            .notification_service
            .send_notifications_for_alert_rule(rule.id, &message, &context)
            .await
        {
            // The firing stands even when delivery fails; channels already
            // got their individual retries logged by the sender layer.
            error!(rule_id = rule.id, error = %e, "Failed to send notifications for alert rule.");
        }

        Ok(())
    }
}

/// Cooldown check: a rule that fired at `last` may not re-fire before
/// `last + cooldown`.
pub fn in_cooldown(
    last_triggered_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_seconds: i32,
) -> bool {
    match last_triggered_at {
        Some(last) => now < last + ChronoDuration::seconds(cooldown_seconds as i64),
        None => false,
    }
}

/// Computes the numeric signal named by `condition_type` over a window of
/// results. Returns None for condition types this engine does not know.
pub fn compute_condition_metric(
    condition_type: &str,
    results: &[check_result::Model],
) -> Option<f64> {
    if results.is_empty() {
        return None;
    }
    let total = results.len() as f64;

    match condition_type {
        "error_rate" => {
            let failures = results
                .iter()
                .filter(|r| r.status != CheckStatus::Success)
                .count() as f64;
            Some(failures / total * 100.0)
        }
        "uptime" => {
            let successes = results
                .iter()
                .filter(|r| r.status == CheckStatus::Success)
                .count() as f64;
            Some(successes / total * 100.0)
        }
        "response_time" => {
            let sum: i64 = results.iter().map(|r| r.latency_ms).sum();
            Some(sum as f64 / total)
        }
        // Rate-limit proximity: share of the window answered with HTTP 429.
        "rate_limit_429" => {
            let limited = results
                .iter()
                .filter(|r| r.http_status == Some(429))
                .count() as f64;
            Some(limited / total * 100.0)
        }
        _ => None,
    }
}

/// Compares a computed value against the threshold. Returns None for unknown
/// operators.
pub fn compare_threshold(operator: &str, value: f64, threshold: f64) -> Option<bool> {
    match operator {
        ">" => Some(value > threshold),
        "<" => Some(value < threshold),
        ">=" => Some(value >= threshold),
        "<=" => Some(value <= threshold),
        "=" | "==" => Some((value - threshold).abs() < f64::EPSILON),
        "!=" => Some((value - threshold).abs() > f64::EPSILON),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result_with(status: CheckStatus, http_status: Option<i32>, latency_ms: i64) -> check_result::Model {
        check_result::Model {
            id: 0,
            monitor_id: 1,
            status,
            http_status,
            latency_ms,
            response_size_bytes: None,
            error_detail: None,
            checked_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_error_rate_and_uptime_are_complements() {
        let results = vec![
            result_with(CheckStatus::Success, Some(200), 50),
            result_with(CheckStatus::Success, Some(200), 60),
            result_with(CheckStatus::Failure, Some(500), 70),
            result_with(CheckStatus::Timeout, None, 30_000),
        ];

        assert_eq!(compute_condition_metric("error_rate", &results), Some(50.0));
        assert_eq!(compute_condition_metric("uptime", &results), Some(50.0));
    }

    #[test]
    fn test_response_time_is_window_average() {
        let results = vec![
            result_with(CheckStatus::Success, Some(200), 100),
            result_with(CheckStatus::Success, Some(200), 300),
        ];
        assert_eq!(
            compute_condition_metric("response_time", &results),
            Some(200.0)
        );
    }

    #[test]
    fn test_rate_limit_condition_counts_429s() {
        let results = vec![
            result_with(CheckStatus::Failure, Some(429), 20),
            result_with(CheckStatus::Success, Some(200), 20),
            result_with(CheckStatus::Failure, Some(429), 20),
            result_with(CheckStatus::Failure, Some(503), 20),
        ];
        assert_eq!(
            compute_condition_metric("rate_limit_429", &results),
            Some(50.0)
        );
    }

    #[test]
    fn test_unknown_condition_or_empty_window_yields_none() {
        let results = vec![result_with(CheckStatus::Success, Some(200), 10)];
        assert_eq!(compute_condition_metric("disk_usage", &results), None);
        assert_eq!(compute_condition_metric("error_rate", &[]), None);
    }

    #[test]
    fn test_compare_threshold_operators() {
        assert_eq!(compare_threshold(">", 5.0, 4.0), Some(true));
        assert_eq!(compare_threshold("<", 5.0, 4.0), Some(false));
        assert_eq!(compare_threshold(">=", 4.0, 4.0), Some(true));
        assert_eq!(compare_threshold("<=", 3.9, 4.0), Some(true));
        assert_eq!(compare_threshold("==", 4.0, 4.0), Some(true));
        assert_eq!(compare_threshold("!=", 4.0, 4.0), Some(false));
        assert_eq!(compare_threshold("~", 4.0, 4.0), None);
    }

    #[test]
    fn test_cooldown_blocks_refire_within_window() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let cooldown = 600; // ten minutes

        // Five minutes later: still cooling down, even if the condition holds.
        assert!(in_cooldown(Some(t0), t0 + ChronoDuration::minutes(5), cooldown));
        // Exactly at the boundary the rule re-arms.
        assert!(!in_cooldown(Some(t0), t0 + ChronoDuration::minutes(10), cooldown));
        // Eleven minutes later it may fire again.
        assert!(!in_cooldown(Some(t0), t0 + ChronoDuration::minutes(11), cooldown));
        // A rule that never fired is never in cooldown.
        assert!(!in_cooldown(None, t0, cooldown));
    }
}
