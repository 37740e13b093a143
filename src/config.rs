//! Service configuration from environment variables
//!
//! - ASKQL_HOST / ASKQL_PORT: bind address (default 0.0.0.0:8080)
//! - ASKQL_DATABASE_URL: PostgreSQL connection string (required)
//! - ASKQL_DATASETS: `name:namespace` pairs, comma separated (`sales` alone means `sales:sales`)
//! - ASKQL_MAX_QUERY_ROWS: row ceiling (default 10000)
//! - ASKQL_POOL_SIZE, ASKQL_POOL_ACQUIRE_TIMEOUT_SECS: pool sizing (15, 30)
//! - ASKQL_QUERY_TIMEOUT_SECS: per-statement timeout (30)
//! - ASKQL_MAX_RETRIES: local retries of transient failures (2)
//! - ASKQL_MAX_REPAIR_ATTEMPTS: synthesizer repairs per question (1)
//! - ASKQL_UNQUALIFIED_TABLES: accept | require-qualified | check-catalog
//! - ASKQL_SCHEMA_CACHE_TTL_SECS: schema description cache TTL (300)
//! - GEMINI_API_KEY, GEMINI_MODEL, ASKQL_LLM_TIMEOUT_SECS: synthesizer

use std::str::FromStr;
use std::time::Duration;

use crate::data::Dataset;
use crate::exec::{PoolSettings, RetryPolicy};
use crate::guard::{QueryValidator, UnqualifiedTablePolicy};
use crate::pipeline::PipelineConfig;
use crate::synth::GeminiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub datasets: Vec<Dataset>,
    pub max_query_rows: u64,
    pub pool_size: u32,
    pub pool_acquire_timeout: Duration,
    pub query_timeout: Duration,
    pub max_retries: u32,
    pub max_repair_attempts: u32,
    pub unqualified_tables: UnqualifiedTablePolicy,
    pub schema_cache_ttl: Duration,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub llm_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            var("ASKQL_DATABASE_URL").ok_or(ConfigError::Missing("ASKQL_DATABASE_URL"))?;

        let max_query_rows: u64 = parse_or(&var, "ASKQL_MAX_QUERY_ROWS", 10_000)?;
        if max_query_rows == 0 {
            return Err(ConfigError::Invalid {
                key: "ASKQL_MAX_QUERY_ROWS",
                value: "0".into(),
            });
        }

        let unqualified_tables = match var("ASKQL_UNQUALIFIED_TABLES") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "ASKQL_UNQUALIFIED_TABLES",
                value,
            })?,
            None => UnqualifiedTablePolicy::default(),
        };

        Ok(Self {
            host: var("ASKQL_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "ASKQL_PORT", 8080)?,
            database_url,
            datasets: var("ASKQL_DATASETS")
                .map(|s| parse_datasets(&s))
                .transpose()?
                .unwrap_or_default(),
            max_query_rows,
            pool_size: parse_or(&var, "ASKQL_POOL_SIZE", 15)?,
            pool_acquire_timeout: Duration::from_secs(parse_or(
                &var,
                "ASKQL_POOL_ACQUIRE_TIMEOUT_SECS",
                30,
            )?),
            query_timeout: Duration::from_secs(parse_or(&var, "ASKQL_QUERY_TIMEOUT_SECS", 30)?),
            max_retries: parse_or(&var, "ASKQL_MAX_RETRIES", 2)?,
            max_repair_attempts: parse_or(&var, "ASKQL_MAX_REPAIR_ATTEMPTS", 1)?,
            unqualified_tables,
            schema_cache_ttl: Duration::from_secs(parse_or(
                &var,
                "ASKQL_SCHEMA_CACHE_TTL_SECS",
                300,
            )?),
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-pro".to_string()),
            llm_timeout: Duration::from_secs(parse_or(&var, "ASKQL_LLM_TIMEOUT_SECS", 30)?),
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.pool_size,
            acquire_timeout: self.pool_acquire_timeout,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_repair_attempts: self.max_repair_attempts,
            synth_timeout: self.llm_timeout,
            validator: QueryValidator::new(self.unqualified_tables),
        }
    }

    /// `None` when no API key is configured
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let api_key = self.gemini_api_key.clone()?;
        Some(GeminiConfig {
            model: self.gemini_model.clone(),
            timeout: self.llm_timeout,
            ..GeminiConfig::new(api_key)
        })
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// `sales:sales_data,hr` -> [Sales over sales_data, hr over hr]
fn parse_datasets(raw: &str) -> Result<Vec<Dataset>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((name, namespace)) if !name.trim().is_empty() && !namespace.trim().is_empty() => {
                Ok(Dataset::new(name.trim(), namespace.trim()))
            }
            Some(_) => Err(ConfigError::Invalid {
                key: "ASKQL_DATASETS",
                value: entry.to_string(),
            }),
            None => Ok(Dataset::named(entry)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[("ASKQL_DATABASE_URL", "postgres://localhost/db")]).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.max_query_rows, 10_000);
        assert_eq!(s.pool_size, 15);
        assert_eq!(s.max_retries, 2);
        assert_eq!(s.max_repair_attempts, 1);
        assert_eq!(s.unqualified_tables, UnqualifiedTablePolicy::Accept);
        assert_eq!(s.schema_cache_ttl, Duration::from_secs(300));
        assert!(s.datasets.is_empty());
        assert!(s.gemini_config().is_none());
    }

    #[test]
    fn test_database_url_required() {
        assert!(matches!(
            settings(&[]),
            Err(ConfigError::Missing("ASKQL_DATABASE_URL"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            settings(&[("ASKQL_DATABASE_URL", "x"), ("ASKQL_PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "ASKQL_PORT", .. })
        ));
        assert!(matches!(
            settings(&[("ASKQL_DATABASE_URL", "x"), ("ASKQL_UNQUALIFIED_TABLES", "maybe")]),
            Err(ConfigError::Invalid { key: "ASKQL_UNQUALIFIED_TABLES", .. })
        ));
        assert!(matches!(
            settings(&[("ASKQL_DATABASE_URL", "x"), ("ASKQL_MAX_QUERY_ROWS", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_datasets_and_policy() {
        let s = settings(&[
            ("ASKQL_DATABASE_URL", "x"),
            ("ASKQL_DATASETS", "Sales:sales_data, hr"),
            ("ASKQL_UNQUALIFIED_TABLES", "check-catalog"),
            ("GEMINI_API_KEY", "secret"),
        ])
        .unwrap();

        let namespaces: Vec<_> = s.datasets.iter().map(|d| d.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["sales_data", "hr"]);
        assert_eq!(
            s.pipeline_config().validator.unqualified_policy(),
            UnqualifiedTablePolicy::CheckCatalog
        );
        assert_eq!(s.gemini_config().unwrap().model, "gemini-pro");
    }
}
