//! Scheduling engine: decides which monitors are due, fans their probes out
//! under a concurrency cap, and persists every outcome.
//!
//! The due filter is a pure function over the monitor population; the engine
//! is safe to invoke at any cadence because monitors whose interval has not
//! elapsed simply skip the tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{debug, error, info, warn};

use crate::db::entities::{connection, monitor};
use crate::db::enums::CheckStatus;
use crate::db::services::{check_result_service, connection_service, monitor_service};
use crate::db::services::check_result_service::NewCheckResult;
use crate::monitoring::executor::ProbeExecutor;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Failed to read monitor population: {0}")]
    Population(#[from] DbErr),
}

/// Structured summary returned from one scheduling cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub executed: u32,
    pub successful: u32,
    pub failed: u32,
    pub total_active: u32,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionSummary {
    fn empty(total_active: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            executed: 0,
            successful: 0,
            failed: 0,
            total_active,
            timestamp,
        }
    }
}

/// Pure due filter. A monitor must run now iff its connection and itself are
/// active and either it has never executed or its interval has elapsed,
/// compared at second granularity.
pub fn is_due(monitor: &monitor::Model, conn: &connection::Model, now: DateTime<Utc>) -> bool {
    if !conn.is_active || !monitor.is_active {
        return false;
    }
    match monitor.last_executed_at {
        None => true,
        Some(last) => (now - last).num_seconds() >= monitor.interval_seconds as i64,
    }
}

enum ProbeTaskOutcome {
    Succeeded,
    Failed,
    Skipped,
}

pub struct SchedulingEngine {
    db: DatabaseConnection,
    executor: Arc<ProbeExecutor>,
    max_concurrent_probes: usize,
}

impl SchedulingEngine {
    pub fn new(
        db: DatabaseConnection,
        executor: Arc<ProbeExecutor>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            db,
            executor,
            max_concurrent_probes: max_concurrent_probes.max(1),
        }
    }

    /// Drives `run_due_cycle` on a fixed tick. The tick only needs to be as
    /// fine as the smallest configured interval; anything finer is absorbed
    /// by the due filter.
    pub async fn start_periodic_scheduling(self: Arc<Self>, period_seconds: u64) {
        info!(
            interval_seconds = period_seconds,
            "Scheduling engine started."
        );
        let mut ticker = interval(TokioDuration::from_secs(period_seconds));
        loop {
            ticker.tick().await;
            match self.run_due_cycle(Utc::now()).await {
                Ok(summary) => {
                    debug!(
                        executed = summary.executed,
                        successful = summary.successful,
                        failed = summary.failed,
                        "Scheduling cycle finished."
                    );
                }
                Err(e) => {
                    error!(error = %e, "Scheduling cycle failed.");
                }
            }
        }
    }

    /// Runs one scheduling cycle: select due monitors, execute them
    /// concurrently with per-monitor isolation, persist every outcome, and
    /// summarize. Only the population read is a hard failure; individual
    /// probe failures are data, not errors.
    pub async fn run_due_cycle(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ExecutionSummary, SchedulerError> {
        let population = monitor_service::get_due_candidates(&self.db).await?;
        let total_active = population.len() as u32;

        let due: Vec<(monitor::Model, connection::Model)> = population
            .into_iter()
            .filter(|(m, c)| is_due(m, c, now))
            .collect();

        if due.is_empty() {
            info!(total_active, "No monitors due this cycle.");
            return Ok(ExecutionSummary::empty(total_active, now));
        }

        info!(due = due.len(), total_active, "Executing due monitors.");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_probes));
        let mut tasks = JoinSet::new();

        for (monitor, conn) in due {
            let db = self.db.clone();
            let executor = self.executor.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return ProbeTaskOutcome::Skipped,
                };
                execute_and_persist(&db, &executor, monitor, conn).await
            });
        }

        let mut executed = 0u32;
        let mut successful = 0u32;
        let mut failed = 0u32;

        // Every task outcome is observed; a panicking probe surfaces as a
        // JoinError and counts as failed without disturbing its siblings.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ProbeTaskOutcome::Succeeded) => {
                    executed += 1;
                    successful += 1;
                }
                Ok(ProbeTaskOutcome::Failed) => {
                    executed += 1;
                    failed += 1;
                }
                Ok(ProbeTaskOutcome::Skipped) => {}
                Err(e) => {
                    error!(error = %e, "Probe task aborted unexpectedly.");
                    executed += 1;
                    failed += 1;
                }
            }
        }

        let summary = ExecutionSummary {
            executed,
            successful,
            failed,
            total_active,
            timestamp: now,
        };
        info!(
            executed = summary.executed,
            successful = summary.successful,
            failed = summary.failed,
            "Due cycle complete."
        );

        Ok(summary)
    }
}

/// Executes one monitor and persists the outcome. `last_executed_at` is
/// stamped with the execution start time *before* the probe runs: the
/// conditional write doubles as a claim, so a probe outlasting the tick
/// cannot be re-triggered by the next cycle, and the interval contract holds
/// for timeouts and errors alike.
async fn execute_and_persist(
    db: &DatabaseConnection,
    executor: &ProbeExecutor,
    monitor: monitor::Model,
    conn: connection::Model,
) -> ProbeTaskOutcome {
    // Defensive re-check: a connection deactivated between selection and
    // execution is excluded. A failed re-check is tolerated and the stale
    // execution proceeds as a bounded inconsistency.
    match connection_service::is_connection_active(db, conn.id).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(
                monitor_id = monitor.id,
                connection_id = conn.id,
                "Connection deactivated after selection; skipping probe."
            );
            return ProbeTaskOutcome::Skipped;
        }
        Err(e) => {
            warn!(monitor_id = monitor.id, error = %e, "Activity re-check failed; proceeding.");
        }
    }

    let started_at = Utc::now();
    match monitor_service::mark_executed(db, monitor.id, started_at).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(
                monitor_id = monitor.id,
                "Another cycle already claimed this execution; skipping probe."
            );
            return ProbeTaskOutcome::Skipped;
        }
        Err(e) => {
            // Proceed; the probe result is still worth recording if storage
            // recovers by the time it completes.
            warn!(monitor_id = monitor.id, error = %e, "Failed to stamp last_executed_at; proceeding.");
        }
    }

    let outcome = executor.execute(&monitor, &conn).await;
    let succeeded = outcome.status == CheckStatus::Success;

    if let Err(e) = check_result_service::record_result(
        db,
        NewCheckResult {
            monitor_id: monitor.id,
            status: outcome.status,
            http_status: outcome.http_status,
            latency_ms: outcome.latency_ms,
            response_size_bytes: outcome.response_size_bytes,
            error_detail: outcome.error_detail,
            checked_at: started_at,
        },
    )
    .await
    {
        error!(monitor_id = monitor.id, error = %e, "Failed to persist check result.");
        return ProbeTaskOutcome::Failed;
    }

    if succeeded {
        ProbeTaskOutcome::Succeeded
    } else {
        ProbeTaskOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_connection(id: i32, is_active: bool) -> connection::Model {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        connection::Model {
            id,
            user_id: 1,
            name: format!("conn-{id}"),
            provider: "openai".to_string(),
            base_url: "https://api.example.com".to_string(),
            auth_type: "bearer".to_string(),
            credentials_enc: "aa:bb:cc".to_string(),
            is_active,
            cost_tracking_enabled: false,
            created_at: t,
            updated_at: t,
        }
    }

    fn test_monitor(
        id: i32,
        interval_seconds: i32,
        last_executed_at: Option<DateTime<Utc>>,
    ) -> monitor::Model {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        monitor::Model {
            id,
            connection_id: 1,
            name: format!("monitor-{id}"),
            path: "/health".to_string(),
            method: "GET".to_string(),
            interval_seconds,
            timeout_seconds: 30,
            expected_status: None,
            latency_threshold_ms: None,
            is_active: true,
            last_executed_at,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn test_never_executed_is_always_due() {
        let conn = test_connection(1, true);
        let monitor = test_monitor(1, 3600, None);
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(is_due(&monitor, &conn, now));
    }

    #[test]
    fn test_due_exactly_at_interval_boundary() {
        let conn = test_connection(1, true);
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let monitor = test_monitor(1, 60, Some(last));

        assert!(!is_due(&monitor, &conn, last + Duration::seconds(59)));
        assert!(is_due(&monitor, &conn, last + Duration::seconds(60)));
        assert!(is_due(&monitor, &conn, last + Duration::seconds(61)));
    }

    #[test]
    fn test_inactive_monitor_or_connection_excluded() {
        let conn = test_connection(1, true);
        let mut monitor = test_monitor(1, 60, None);
        monitor.is_active = false;
        let now = Utc::now();
        assert!(!is_due(&monitor, &conn, now));

        let inactive_conn = test_connection(1, false);
        let monitor = test_monitor(1, 60, None);
        assert!(!is_due(&monitor, &inactive_conn, now));
    }

    #[test]
    fn test_mixed_interval_population_selection() {
        let conn = test_connection(1, true);
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let fast = test_monitor(1, 30, None);
        let medium = test_monitor(2, 300, None);
        let slow = test_monitor(3, 3600, None);

        // Never executed: all due.
        assert!(is_due(&fast, &conn, t0));
        assert!(is_due(&medium, &conn, t0));
        assert!(is_due(&slow, &conn, t0));

        // All executed at t0; sixty seconds later only the 30s monitor runs.
        let fast = test_monitor(1, 30, Some(t0));
        let medium = test_monitor(2, 300, Some(t0));
        let slow = test_monitor(3, 3600, Some(t0));

        let t1 = t0 + Duration::seconds(60);
        assert!(is_due(&fast, &conn, t1));
        assert!(!is_due(&medium, &conn, t1));
        assert!(!is_due(&slow, &conn, t1));

        // At t0 + 310s the 300s monitor joins; the hourly one still waits.
        let t2 = t0 + Duration::seconds(310);
        assert!(is_due(&fast, &conn, t2));
        assert!(is_due(&medium, &conn, t2));
        assert!(!is_due(&slow, &conn, t2));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = ExecutionSummary {
            executed: 3,
            successful: 2,
            failed: 1,
            total_active: 10,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totalActive"], 10);
        assert_eq!(json["executed"], 3);
        assert!(json["timestamp"].as_str().unwrap().starts_with("2026-01-01T"));
    }
}
