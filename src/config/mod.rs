//! Configuration management
//!
//! Layered defaults -> optional config files -> environment, with .env
//! loaded first. The flat environment names (FETCH_INTERVAL_MILLIS,
//! MIN_SOURCES, ...) map directly onto the config keys; SOURCE_WEIGHT_*
//! overrides are scanned from the environment separately.

use std::collections::HashMap;
use std::str::FromStr;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::aggregate::SourceWeightRegistry;
use crate::error::ConfigError;
use crate::retry::{BackoffMode, RetryPolicy};
use crate::scheduler::SchedulerConfig;
use crate::types::{AggregationMethod, AggregationOptions};

const MIN_INTERVAL_MILLIS: u64 = 1_000;
const MIN_WINDOW_MILLIS: i64 = 1_000;

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    fetch_interval_millis: Option<u64>,
    cron_expression: Option<String>,
    min_sources: usize,
    window_millis: i64,
    default_method: String,
    trim_fraction: f64,
    stock_symbols: String,
    log_level: String,
    ingest_timeout_millis: u64,
    retry_max_attempts: u32,
    retry_delay_millis: u64,
    retry_backoff: String,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// None when cron mode is active
    pub fetch_interval_millis: Option<u64>,
    pub cron_expression: Option<String>,
    pub min_sources: usize,
    pub window_millis: i64,
    pub default_method: AggregationMethod,
    pub trim_fraction: f64,
    pub stock_symbols: Vec<String>,
    pub source_weights: HashMap<String, f64>,
    pub log_level: String,
    pub ingest_timeout_millis: u64,
    pub retry: RetryPolicy,
}

/// Split a comma-separated symbol list, trimming entries and dropping
/// empties.
pub fn parse_symbols(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collect SOURCE_WEIGHT_<NAME> overrides from an iterator of
/// environment pairs.
fn collect_source_weights<I>(vars: I) -> Result<HashMap<String, f64>, ConfigError>
where
    I: Iterator<Item = (String, String)>,
{
    let mut weights = HashMap::new();
    for (key, value) in vars {
        let Some(name) = key.strip_prefix("SOURCE_WEIGHT_") else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let weight: f64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.clone(),
            message: format!("'{value}' is not a number"),
        })?;
        weights.insert(name.to_lowercase(), weight);
    }
    Ok(weights)
}

impl AppConfig {
    /// Load configuration from defaults, optional files and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let raw = Config::builder()
            .set_default("min_sources", 3i64)
            .and_then(|b| b.set_default("window_millis", 30_000i64))
            .and_then(|b| b.set_default("default_method", "weighted-mean"))
            .and_then(|b| b.set_default("trim_fraction", 0.20))
            .and_then(|b| b.set_default("stock_symbols", ""))
            .and_then(|b| b.set_default("log_level", "info"))
            .and_then(|b| b.set_default("ingest_timeout_millis", 10_000i64))
            .and_then(|b| b.set_default("retry_max_attempts", 3i64))
            .and_then(|b| b.set_default("retry_delay_millis", 500i64))
            .and_then(|b| b.set_default("retry_backoff", "exponential"))
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default())
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize::<RawConfig>()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let source_weights = collect_source_weights(std::env::vars())?;
        Self::from_raw(raw, source_weights)
    }

    fn from_raw(
        raw: RawConfig,
        source_weights: HashMap<String, f64>,
    ) -> Result<Self, ConfigError> {
        if let Some(interval) = raw.fetch_interval_millis {
            if interval < MIN_INTERVAL_MILLIS {
                return Err(ConfigError::InvalidValue {
                    key: "FETCH_INTERVAL_MILLIS".into(),
                    message: format!("must be >= {MIN_INTERVAL_MILLIS}, got {interval}"),
                });
            }
        }
        if raw.min_sources < 1 {
            return Err(ConfigError::InvalidValue {
                key: "MIN_SOURCES".into(),
                message: "must be >= 1".into(),
            });
        }
        if raw.window_millis < MIN_WINDOW_MILLIS {
            return Err(ConfigError::InvalidValue {
                key: "WINDOW_MILLIS".into(),
                message: format!("must be >= {MIN_WINDOW_MILLIS}, got {}", raw.window_millis),
            });
        }
        if !(0.0..0.5).contains(&raw.trim_fraction) {
            return Err(ConfigError::InvalidValue {
                key: "TRIM_FRACTION".into(),
                message: format!("must be in [0, 0.5), got {}", raw.trim_fraction),
            });
        }
        let default_method =
            AggregationMethod::from_str(&raw.default_method).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "DEFAULT_METHOD".into(),
                    message: format!("unknown method '{}'", raw.default_method),
                }
            })?;
        let log_level = raw.log_level.trim().to_lowercase();
        if !matches!(log_level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::InvalidValue {
                key: "LOG_LEVEL".into(),
                message: format!("unknown level '{}'", raw.log_level),
            });
        }
        let mode = match raw.retry_backoff.trim().to_lowercase().as_str() {
            "fixed" => BackoffMode::Fixed,
            "exponential" => BackoffMode::Exponential,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "RETRY_BACKOFF".into(),
                    message: format!("unknown mode '{other}'"),
                })
            }
        };

        // Interval mode wins; cron applies only when no interval was
        // configured anywhere. With neither, the default interval holds.
        let cron_expression = raw.cron_expression.filter(|e| !e.trim().is_empty());
        let fetch_interval_millis = match (&raw.fetch_interval_millis, &cron_expression) {
            (Some(interval), _) => Some(*interval),
            (None, Some(_)) => None,
            (None, None) => Some(60_000),
        };
        if let Some(expression) = &cron_expression {
            cron::Schedule::from_str(expression).map_err(|e| ConfigError::InvalidValue {
                key: "CRON_EXPRESSION".into(),
                message: e.to_string(),
            })?;
        }

        Ok(Self {
            fetch_interval_millis,
            cron_expression,
            min_sources: raw.min_sources,
            window_millis: raw.window_millis,
            default_method,
            trim_fraction: raw.trim_fraction,
            stock_symbols: parse_symbols(&raw.stock_symbols),
            source_weights,
            log_level,
            ingest_timeout_millis: raw.ingest_timeout_millis,
            retry: RetryPolicy {
                max_attempts: raw.retry_max_attempts.max(1),
                delay_millis: raw.retry_delay_millis,
                mode,
            },
        })
    }

    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            min_sources: self.min_sources,
            window_millis: self.window_millis,
            method: self.default_method,
            trim_fraction: self.trim_fraction,
            source_weight_overrides: None,
        }
    }

    pub fn weight_registry(&self) -> Result<SourceWeightRegistry, ConfigError> {
        SourceWeightRegistry::from_overrides(&self.source_weights)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval_millis: self.fetch_interval_millis,
            cron_expression: self.cron_expression.clone(),
            symbols: self.stock_symbols.clone(),
            options: self.aggregation_options(),
            retry: self.retry,
            ingest_timeout_millis: self.ingest_timeout_millis,
        }
    }

    /// One-line config digest for startup logging, no secrets.
    pub fn digest(&self) -> String {
        format!(
            "interval={:?} cron={:?} symbols={:?} min_sources={} window_ms={} method={} trim={}",
            self.fetch_interval_millis,
            self.cron_expression,
            self.stock_symbols,
            self.min_sources,
            self.window_millis,
            self.default_method,
            self.trim_fraction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawConfig {
        RawConfig {
            fetch_interval_millis: None,
            cron_expression: None,
            min_sources: 3,
            window_millis: 30_000,
            default_method: "weighted-mean".into(),
            trim_fraction: 0.2,
            stock_symbols: "AAPL, MSFT, ,GOOGL ,".into(),
            log_level: "info".into(),
            ingest_timeout_millis: 10_000,
            retry_max_attempts: 3,
            retry_delay_millis: 500,
            retry_backoff: "exponential".into(),
        }
    }

    #[test]
    fn symbols_are_trimmed_and_empties_dropped() {
        assert_eq!(parse_symbols("AAPL, MSFT, ,GOOGL ,"), vec!["AAPL", "MSFT", "GOOGL"]);
        assert!(parse_symbols("  ,, ").is_empty());
    }

    #[test]
    fn default_interval_applies_without_cron() {
        let config = AppConfig::from_raw(raw(), HashMap::new()).unwrap();
        assert_eq!(config.fetch_interval_millis, Some(60_000));
        assert_eq!(config.stock_symbols, vec!["AAPL", "MSFT", "GOOGL"]);
    }

    #[test]
    fn cron_applies_only_when_interval_unset() {
        let mut cfg = raw();
        cfg.cron_expression = Some("0 * * * * *".into());
        let config = AppConfig::from_raw(cfg, HashMap::new()).unwrap();
        assert_eq!(config.fetch_interval_millis, None);
        assert!(config.cron_expression.is_some());

        let mut cfg = raw();
        cfg.cron_expression = Some("0 * * * * *".into());
        cfg.fetch_interval_millis = Some(5_000);
        let config = AppConfig::from_raw(cfg, HashMap::new()).unwrap();
        assert_eq!(config.fetch_interval_millis, Some(5_000));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = raw();
        cfg.fetch_interval_millis = Some(500);
        assert!(AppConfig::from_raw(cfg, HashMap::new()).is_err());

        let mut cfg = raw();
        cfg.min_sources = 0;
        assert!(AppConfig::from_raw(cfg, HashMap::new()).is_err());

        let mut cfg = raw();
        cfg.window_millis = 10;
        assert!(AppConfig::from_raw(cfg, HashMap::new()).is_err());

        let mut cfg = raw();
        cfg.trim_fraction = 0.5;
        assert!(AppConfig::from_raw(cfg, HashMap::new()).is_err());

        let mut cfg = raw();
        cfg.default_method = "harmonic".into();
        assert!(AppConfig::from_raw(cfg, HashMap::new()).is_err());

        let mut cfg = raw();
        cfg.cron_expression = Some("not a cron".into());
        assert!(AppConfig::from_raw(cfg, HashMap::new()).is_err());
    }

    #[test]
    fn source_weight_vars_are_collected() {
        let vars = vec![
            ("SOURCE_WEIGHT_ALPHA_VANTAGE".to_string(), "2.5".to_string()),
            ("SOURCE_WEIGHT_DEFAULT".to_string(), "0.5".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let weights = collect_source_weights(vars.into_iter()).unwrap();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights["alpha_vantage"], 2.5);
        assert_eq!(weights["default"], 0.5);
    }

    #[test]
    fn malformed_source_weight_is_an_error() {
        let vars = vec![("SOURCE_WEIGHT_FINNHUB".to_string(), "heavy".to_string())];
        assert!(collect_source_weights(vars.into_iter()).is_err());
    }
}
