//! Application configuration loaded from environment variables.

use common::Money;

/// Platform configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `MIN_CHARGE_CENTS` — minimum order total in cents (default: `5000`)
/// - `LOW_STOCK_THRESHOLD` — seller alert threshold (default: `10`)
/// - `CRITICAL_STOCK_THRESHOLD` — admin escalation threshold (default: `3`)
/// - `BROKER_WORKERS` — consumer worker pool size (default: `4`)
/// - `BROKER_QUEUE_DEPTH` — per-queue buffer (default: `256`)
/// - `METRICS_PORT` — Prometheus exporter port (default: `9000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub min_charge_cents: i64,
    pub low_stock_threshold: u32,
    pub critical_stock_threshold: u32,
    pub broker_workers: usize,
    pub broker_queue_depth: usize,
    pub metrics_port: u16,
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            min_charge_cents: env_parsed("MIN_CHARGE_CENTS", 5000),
            low_stock_threshold: env_parsed("LOW_STOCK_THRESHOLD", 10),
            critical_stock_threshold: env_parsed("CRITICAL_STOCK_THRESHOLD", 3),
            broker_workers: env_parsed("BROKER_WORKERS", 4),
            broker_queue_depth: env_parsed("BROKER_QUEUE_DEPTH", 256),
            metrics_port: env_parsed("METRICS_PORT", 9000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn min_charge(&self) -> Money {
        Money::from_cents(self.min_charge_cents)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_charge_cents: 5000,
            low_stock_threshold: 10,
            critical_stock_threshold: 3,
            broker_workers: 4,
            broker_queue_depth: 256,
            metrics_port: 9000,
            log_level: "info".to_string(),
        }
    }
}
