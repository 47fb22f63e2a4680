use std::{env, time::Duration};

use log::*;
use loyalty_common::{
    helpers::{parse_boolean_flag, parse_duration},
    Secret,
};
use loyalty_engine::accrual::{
    EngineConfig,
    DEFAULT_ACCRUAL_ADDRESS,
    DEFAULT_DISCOVERY_INTERVAL,
    DEFAULT_RATE_LIMIT_FALLBACK,
    DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_WORKERS,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/loyalty.db";
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// May carry credentials, so it is never logged.
    pub database_url: Secret<String>,
    pub max_connections: u32,
    /// Apply the embedded database migrations before starting the engine.
    pub run_migrations: bool,
    /// How long to wait for the engine to stop after Ctrl-C before giving up.
    pub shutdown_timeout: Duration,
    pub engine: EngineConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: Secret::new(DEFAULT_DATABASE_URL.to_string()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            run_migrations: true,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            engine: EngineConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which returns the value of a variable if it is set. Invalid values are
    /// logged and replaced with their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let database_url = lookup("LOYALTY_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ LOYALTY_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let accrual_address = lookup("LOYALTY_ACCRUAL_ADDRESS").filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            warn!("🪛️ LOYALTY_ACCRUAL_ADDRESS is not set. Using the default, {DEFAULT_ACCRUAL_ADDRESS}.");
            DEFAULT_ACCRUAL_ADDRESS.to_string()
        });
        let workers = count_var(&lookup, "LOYALTY_ACCRUAL_WORKERS").unwrap_or(DEFAULT_WORKERS);
        let queue_capacity = count_var(&lookup, "LOYALTY_QUEUE_CAPACITY");
        let discovery_interval = duration_var(
            &lookup,
            "LOYALTY_DISCOVERY_INTERVAL_MS",
            Duration::from_millis,
            DEFAULT_DISCOVERY_INTERVAL,
        );
        let rate_limit_fallback = duration_var(
            &lookup,
            "LOYALTY_RATE_LIMIT_FALLBACK_SECS",
            Duration::from_secs,
            DEFAULT_RATE_LIMIT_FALLBACK,
        );
        let request_timeout =
            duration_var(&lookup, "LOYALTY_ACCRUAL_TIMEOUT_SECS", Duration::from_secs, DEFAULT_REQUEST_TIMEOUT);
        let shutdown_timeout =
            duration_var(&lookup, "LOYALTY_SHUTDOWN_TIMEOUT_SECS", Duration::from_secs, DEFAULT_SHUTDOWN_TIMEOUT);
        let run_migrations = parse_boolean_flag(lookup("LOYALTY_RUN_MIGRATIONS"), true);
        let mut engine = EngineConfig::new(&accrual_address)
            .with_workers(workers)
            .with_discovery_interval(discovery_interval)
            .with_rate_limit_fallback(rate_limit_fallback)
            .with_request_timeout(request_timeout);
        if let Some(capacity) = queue_capacity {
            engine = engine.with_queue_capacity(capacity);
        }
        // Every worker may hold a connection while the discovery pass holds another.
        let max_connections = u32::try_from(workers + 1).unwrap_or(u32::MAX).max(DEFAULT_MAX_CONNECTIONS);
        Self { database_url: Secret::new(database_url), max_connections, run_migrations, shutdown_timeout, engine }
    }
}

/// A positive count, or `None` if the variable is unset or invalid.
fn count_var<F>(lookup: &F, name: &str) -> Option<usize>
where F: Fn(&str) -> Option<String> {
    let value = lookup(name)?;
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            error!("🪛️ {value} is not a valid count for {name}. Using the default instead.");
            None
        },
    }
}

fn duration_var<F>(lookup: &F, name: &str, unit: fn(u64) -> Duration, default: Duration) -> Duration
where F: Fn(&str) -> Option<String> {
    match lookup(name) {
        Some(s) => parse_duration(&s, unit).unwrap_or_else(|e| {
            error!("🪛️ Invalid value for {name}. {e} Using the default, {default:?}, instead.");
            default
        }),
        None => default,
    }
}
