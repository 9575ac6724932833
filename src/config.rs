//! Configuration management for Sheet Agent.
//!
//! Configuration is set via environment variables:
//! - `LLM_API_KEY` - Required. API key for the completion endpoint (`ARK_API_KEY` also accepted).
//! - `LLM_MODEL` - Required. Model / endpoint identifier (`ARK_MODEL_ID` also accepted).
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible base URL. Defaults to the Volcengine Ark endpoint.
//! - `LLM_TIMEOUT_SECS` - Optional. Per-request timeout for the LLM call. Defaults to `120`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `5001`.
//! - `UPLOAD_DIR` - Optional. Where uploaded workbooks are stored. Defaults to `uploads`.
//! - `STATIC_DIR` - Optional. Root for generated charts and files. Defaults to `static`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Remote completion endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer token for the endpoint
    pub api_key: String,

    /// Model or endpoint identifier sent with every request
    pub model: String,

    /// OpenAI-compatible base URL (without `/chat/completions`)
    pub base_url: String,

    /// Request timeout; a hung call fails instead of blocking the task forever
    pub timeout: Duration,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM endpoint settings
    pub llm: LlmConfig,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Directory for uploaded workbooks
    pub upload_dir: PathBuf,

    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the API key or model is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env_with_fallback("LLM_API_KEY", "ARK_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))?;

        let model = env_with_fallback("LLM_MODEL", "ARK_MODEL_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_MODEL".to_string()))?;

        let base_url = std::env::var("LLM_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs: u64 = std::env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("LLM_TIMEOUT_SECS".to_string(), format!("{}", e)))?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5001".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static"));

        Ok(Self {
            llm: LlmConfig {
                api_key,
                model,
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            host,
            port,
            upload_dir,
            static_dir,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, model: String, static_dir: PathBuf) -> Self {
        Self {
            llm: LlmConfig {
                api_key,
                model,
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout: Duration::from_secs(120),
            },
            host: "127.0.0.1".to_string(),
            port: 5001,
            upload_dir: PathBuf::from("uploads"),
            static_dir,
        }
    }

    /// Output directory for generated charts.
    pub fn chart_output_dir(&self) -> PathBuf {
        self.static_dir.join("charts")
    }

    /// Output directory for generated workbooks.
    pub fn file_output_dir(&self) -> PathBuf {
        self.static_dir.join("outputs")
    }
}

fn env_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dirs_live_under_static_dir() {
        let config = Config::new("key".into(), "model".into(), PathBuf::from("/srv/static"));
        assert_eq!(config.chart_output_dir(), PathBuf::from("/srv/static/charts"));
        assert_eq!(config.file_output_dir(), PathBuf::from("/srv/static/outputs"));
        assert_eq!(config.port, 5001);
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
    }
}
