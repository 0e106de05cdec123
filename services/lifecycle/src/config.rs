use std::time::Duration;

use anyhow::{bail, Result};

use crate::audit::DEFAULT_AUDIT_TIMEOUT;
use crate::consumer::DEFAULT_MAX_ATTEMPTS;
use crate::db::DbConfig;
use crate::scanner::{DEFAULT_SCAN_HOUR, DEFAULT_WARNING_DAYS};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub dev_mode: bool,
    pub database: DbConfig,
    /// Audit sink URL; audit events are logged and dropped when unset.
    pub audit_endpoint: Option<String>,
    pub audit_timeout: Duration,
    /// Local hour (0-23) of the daily expiration scan.
    pub scan_hour: u32,
    pub warning_days: i64,
    pub consumer_max_attempts: u32,
    pub ledger_retention_days: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let log_level = std::env::var("LOCKBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("LOCKBOX_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let audit_endpoint = std::env::var("LOCKBOX_AUDIT_ENDPOINT").ok();

        let audit_timeout = std::env::var("LOCKBOX_AUDIT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_AUDIT_TIMEOUT);

        let scan_hour = match std::env::var("LOCKBOX_SCAN_HOUR") {
            Ok(raw) => {
                let hour: u32 = raw.parse()?;
                if hour > 23 {
                    bail!("LOCKBOX_SCAN_HOUR must be 0-23, got {hour}");
                }
                hour
            }
            Err(_) => DEFAULT_SCAN_HOUR,
        };

        let warning_days = std::env::var("LOCKBOX_EXPIRY_WARNING_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WARNING_DAYS);

        let consumer_max_attempts = std::env::var("LOCKBOX_CONSUMER_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);

        let ledger_retention_days = std::env::var("LOCKBOX_LEDGER_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let database = DbConfig::from_env();

        Ok(Self {
            log_level,
            dev_mode,
            database,
            audit_endpoint,
            audit_timeout,
            scan_hour,
            warning_days,
            consumer_max_attempts,
            ledger_retention_days,
        })
    }
}
