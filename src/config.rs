//! Configuration management for the court form filler
//!
//! Everything is read once at startup into an immutable [`AppConfig`] that
//! request handlers receive through shared state.

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub form: FormConfig,
    pub output: OutputConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Key used to sign flash cookies
    pub secret_key: String,
    /// Upper bound for a form submission body
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Fillable PDF template
    pub template_path: PathBuf,
    /// Optional JSON schema replacing the built-in field table
    pub schema_path: Option<PathBuf>,
    /// Flatten widgets into page content after filling
    pub flatten: bool,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Archive directory; `None` keeps every response in memory only
    pub dir: Option<PathBuf>,
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub max_files: usize,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                secret_key: generate_secret_key(),
                max_body_bytes: 64 * 1024,
            },
            form: FormConfig {
                template_path: PathBuf::from("assets/fl300_template.pdf"),
                schema_path: None,
                flatten: false,
            },
            output: OutputConfig {
                dir: None,
                ttl: Duration::from_secs(3600),
                sweep_interval: Duration::from_secs(300),
                max_files: 500,
            },
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    /// Unset keys fall back to defaults; set but unparseable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = match get("SECRET_KEY") {
            Some(key) => key,
            None => {
                tracing::warn!("SECRET_KEY not set, using a random per-process key");
                defaults.server.secret_key.clone()
            }
        };

        Ok(AppConfig {
            server: ServerConfig {
                host: get("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or(&get, "SERVER_PORT", defaults.server.port)?,
                secret_key,
                max_body_bytes: parse_or(&get, "MAX_BODY_BYTES", defaults.server.max_body_bytes)?,
            },
            form: FormConfig {
                template_path: get("TEMPLATE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.form.template_path),
                schema_path: get("SCHEMA_PATH").map(PathBuf::from),
                flatten: parse_bool_or(&get, "FLATTEN_OUTPUT", defaults.form.flatten)?,
            },
            output: OutputConfig {
                dir: get("OUTPUT_DIR").map(PathBuf::from),
                ttl: Duration::from_secs(parse_or(
                    &get,
                    "OUTPUT_TTL_SECS",
                    defaults.output.ttl.as_secs(),
                )?),
                sweep_interval: Duration::from_secs(parse_or(
                    &get,
                    "OUTPUT_SWEEP_SECS",
                    defaults.output.sweep_interval.as_secs(),
                )?),
                max_files: parse_or(&get, "OUTPUT_MAX_FILES", defaults.output.max_files)?,
            },
            llm: LlmConfig {
                api_base: get("LLM_API_BASE")
                    .map(|base| base.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.llm.api_base),
                model: get("LLM_MODEL").unwrap_or(defaults.llm.model),
                timeout: Duration::from_secs(parse_or(
                    &get,
                    "LLM_TIMEOUT_SECS",
                    defaults.llm.timeout.as_secs(),
                )?),
                max_retries: parse_or(&get, "LLM_MAX_RETRIES", defaults.llm.max_retries)?,
                retry_backoff: Duration::from_millis(parse_or(
                    &get,
                    "LLM_RETRY_BACKOFF_MS",
                    defaults.llm.retry_backoff.as_millis() as u64,
                )?),
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| Error::Config {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config {
                key: key.to_string(),
                reason: format!("expected a boolean, got {:?}", v),
            }),
        },
        None => Ok(default),
    }
}

fn generate_secret_key() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.secret_key.len(), 64);
        assert!(config.output.dir.is_none());
        assert!(!config.form.flatten);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SERVER_PORT", "8080"),
            ("SECRET_KEY", "s3cret"),
            ("TEMPLATE_PATH", "/forms/fl300.pdf"),
            ("FLATTEN_OUTPUT", "yes"),
            ("OUTPUT_DIR", "/tmp/filled"),
            ("OUTPUT_TTL_SECS", "60"),
            ("LLM_API_BASE", "http://localhost:9999/v1/"),
            ("LLM_RETRY_BACKOFF_MS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.secret_key, "s3cret");
        assert_eq!(config.form.template_path, PathBuf::from("/forms/fl300.pdf"));
        assert!(config.form.flatten);
        assert_eq!(config.output.dir, Some(PathBuf::from("/tmp/filled")));
        assert_eq!(config.output.ttl, Duration::from_secs(60));
        assert_eq!(config.llm.api_base, "http://localhost:9999/v1");
        assert_eq!(config.llm.retry_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_number_is_error() {
        let result = AppConfig::from_lookup(lookup(&[("SERVER_PORT", "eighty")]));
        assert!(matches!(result, Err(Error::Config { ref key, .. }) if key == "SERVER_PORT"));
    }

    #[test]
    fn test_invalid_bool_is_error() {
        let result = AppConfig::from_lookup(lookup(&[("FLATTEN_OUTPUT", "maybe")]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("SERVER_PORT", "  ")])).unwrap();
        assert_eq!(config.server.port, 5000);
    }
}
