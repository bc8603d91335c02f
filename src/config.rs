//! Application configuration: an optional TOML file layered under
//! environment variables, environment winning. Only the database URL and the
//! credential key are required; everything else has sensible defaults.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// 32-byte hex key sealing credential bundles and channel configs.
    pub credential_encryption_key: String,
    pub scheduler_tick_seconds: u64,
    pub evaluation_tick_seconds: u64,
    pub cost_sync_tick_seconds: u64,
    pub max_concurrent_probes: usize,
    pub result_retention_days: i64,
    pub log_dir: String,
}

// Partial config for layering.
#[derive(Deserialize, Default, Debug)]
struct PartialAppConfig {
    database_url: Option<String>,
    credential_encryption_key: Option<String>,
    scheduler_tick_seconds: Option<u64>,
    evaluation_tick_seconds: Option<u64>,
    cost_sync_tick_seconds: Option<u64>,
    max_concurrent_probes: Option<usize>,
    result_retention_days: Option<i64>,
    log_dir: Option<String>,
}

impl PartialAppConfig {
    fn from_env() -> Result<Self, String> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            credential_encryption_key: env::var("CREDENTIAL_ENCRYPTION_KEY").ok(),
            scheduler_tick_seconds: parse_env("SCHEDULER_TICK_SECONDS")?,
            evaluation_tick_seconds: parse_env("EVALUATION_TICK_SECONDS")?,
            cost_sync_tick_seconds: parse_env("COST_SYNC_TICK_SECONDS")?,
            max_concurrent_probes: parse_env("MAX_CONCURRENT_PROBES")?,
            result_retention_days: parse_env("RESULT_RETENTION_DAYS")?,
            log_dir: env::var("LOG_DIR").ok(),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{name} has an invalid value: {raw}")),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional).
        let file_config: PartialAppConfig = if let Some(path_str) = config_path {
            let path = Path::new(path_str);
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                toml::from_str(&contents)
                    .map_err(|e| format!("Failed to parse TOML config at {path:?}: {e}"))?
            } else {
                PartialAppConfig::default()
            }
        } else {
            PartialAppConfig::default()
        };

        // 2. Environment overrides file.
        let env_config = PartialAppConfig::from_env()?;

        let credential_encryption_key = env_config
            .credential_encryption_key
            .or(file_config.credential_encryption_key)
            .ok_or("CREDENTIAL_ENCRYPTION_KEY is required")?;

        // Fail fast on an unusable key instead of erroring on every probe.
        match hex::decode(&credential_encryption_key) {
            Ok(bytes) if bytes.len() == 32 => {}
            _ => return Err("CREDENTIAL_ENCRYPTION_KEY must be a 32-byte hex string".to_string()),
        }

        Ok(AppConfig {
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .ok_or("DATABASE_URL is required")?,
            credential_encryption_key,
            scheduler_tick_seconds: env_config
                .scheduler_tick_seconds
                .or(file_config.scheduler_tick_seconds)
                .unwrap_or(60),
            evaluation_tick_seconds: env_config
                .evaluation_tick_seconds
                .or(file_config.evaluation_tick_seconds)
                .unwrap_or(60),
            cost_sync_tick_seconds: env_config
                .cost_sync_tick_seconds
                .or(file_config.cost_sync_tick_seconds)
                .unwrap_or(86_400),
            max_concurrent_probes: env_config
                .max_concurrent_probes
                .or(file_config.max_concurrent_probes)
                .unwrap_or(16),
            result_retention_days: env_config
                .result_retention_days
                .or(file_config.result_retention_days)
                .unwrap_or(90),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(|| "logs".to_string()),
        })
    }
}
