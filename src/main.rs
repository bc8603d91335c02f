use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::time::{interval, Duration};
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apiwatch::alerting::evaluation_service::EvaluationService;
use apiwatch::billing::cost_sync_service::CostSyncService;
use apiwatch::config::AppConfig;
use apiwatch::db::services::check_result_service;
use apiwatch::monitoring::executor::ProbeExecutor;
use apiwatch::monitoring::scheduler::SchedulingEngine;
use apiwatch::notifications::service::NotificationService;
use apiwatch::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // File output: JSON, daily rotation. Stdout: human-readable.
    let file_appender = rolling::daily(log_dir, "apiwatch.log");
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false).json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!("Starting apiwatch, version: {}", VERSION);

    // --- Database Pool Setup ---
    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(10);
    let db: DatabaseConnection = Database::connect(opt)
        .await
        .expect("Failed to create database connection.");

    // --- Explicit component construction: each piece is built once and
    // handed to its consumers; there is no global service registry. ---
    let executor = Arc::new(
        ProbeExecutor::new(config.credential_encryption_key.clone())
            .expect("Failed to build probe executor HTTP client."),
    );

    let notification_service = Arc::new(NotificationService::new(
        db.clone(),
        config.credential_encryption_key.clone(),
    ));

    let scheduling_engine = Arc::new(SchedulingEngine::new(
        db.clone(),
        executor,
        config.max_concurrent_probes,
    ));

    let evaluation_service = Arc::new(EvaluationService::new(
        db.clone(),
        notification_service.clone(),
    ));

    let cost_sync_service = Arc::new(
        CostSyncService::new(db.clone(), config.credential_encryption_key.clone())
            .expect("Failed to build cost sync HTTP client."),
    );

    // --- Periodic Engines ---
    let scheduler_handle = tokio::spawn({
        let engine = scheduling_engine.clone();
        let tick = config.scheduler_tick_seconds;
        async move {
            engine.start_periodic_scheduling(tick).await;
        }
    });

    let evaluation_handle = tokio::spawn({
        let service = evaluation_service.clone();
        let tick = config.evaluation_tick_seconds;
        async move {
            service.start_periodic_evaluation(tick).await;
        }
    });

    let cost_sync_handle = tokio::spawn({
        let service = cost_sync_service.clone();
        let tick = config.cost_sync_tick_seconds;
        async move {
            service.start_periodic_sync(tick).await;
        }
    });

    // --- Result Retention Task ---
    let retention_handle = tokio::spawn({
        let db = db.clone();
        let retention_days = config.result_retention_days;
        async move {
            let mut ticker = interval(Duration::from_secs(3600));
            info!(retention_days, "Result retention task started.");
            loop {
                ticker.tick().await;
                let cutoff = Utc::now() - ChronoDuration::days(retention_days);
                match check_result_service::prune_results_older_than(&db, cutoff).await {
                    Ok(0) => {}
                    Ok(pruned) => info!(pruned, "Pruned old check results."),
                    Err(e) => error!(error = %e, "Failed to prune old check results."),
                }
            }
        }
    });

    info!("All services running. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received; stopping.");

    scheduler_handle.abort();
    evaluation_handle.abort();
    cost_sync_handle.abort();
    retention_handle.abort();

    Ok(())
}
