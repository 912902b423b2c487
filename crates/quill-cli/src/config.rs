//! Service configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

use quill_core::impls::OpenAiConfig;
use quill_core::impls::openai_gateway::{API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Runtime configuration for the `quill` binary.
///
/// Every field has a default so `quill serve` works with no environment set
/// (generation then fails per task until `OPENAI_API_KEY` is provided).
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:8080"`).
    pub bind_address: String,

    /// SQLite database file. `:memory:` keeps everything in process.
    pub database: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    pub cache_ttl: Duration,

    /// Upper bound on one generation call. `0` disables the bound.
    pub generation_timeout: Option<Duration>,

    pub model: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("QUILL_BIND", "127.0.0.1:8080"),
            database: PathBuf::from(env_or("QUILL_DATABASE", "quill.db")),
            log_level: env_or("QUILL_LOG", "info"),
            log_json: std::env::var("QUILL_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            cache_ttl: Duration::from_secs(parse_env("QUILL_CACHE_TTL_SECS", 600)),
            generation_timeout: match parse_env("QUILL_GENERATION_TIMEOUT_SECS", 0u64) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            model: env_or("QUILL_MODEL", DEFAULT_MODEL),
            openai_base_url: env_or("QUILL_OPENAI_BASE_URL", DEFAULT_BASE_URL),
            openai_api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.cache_ttl.is_zero(),
            "QUILL_CACHE_TTL_SECS must be greater than zero"
        );
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.as_os_str() == ":memory:"
    }

    pub fn openai(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            model: self.model.clone(),
            base_url: self.openai_base_url.clone(),
            request_timeout: self.generation_timeout,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            bind_address: "127.0.0.1:0".to_string(),
            database: PathBuf::from(":memory:"),
            log_level: "info".to_string(),
            log_json: false,
            cache_ttl: Duration::from_secs(600),
            generation_timeout: Some(Duration::from_secs(30)),
            model: "gpt-4o-mini".to_string(),
            openai_base_url: "http://localhost:1234/v1".to_string(),
            openai_api_key: None,
        }
    }

    #[test]
    fn openai_config_carries_model_and_timeout() {
        let config = sample();

        assert!(config.is_in_memory());
        let openai = config.openai();
        assert_eq!(openai.model, "gpt-4o-mini");
        assert_eq!(openai.base_url, "http://localhost:1234/v1");
        assert_eq!(openai.request_timeout, Some(Duration::from_secs(30)));
        assert!(openai.api_key.is_none());
    }

    #[test]
    fn zero_cache_ttl_is_rejected() {
        assert!(sample().validate().is_ok());

        let config = Config {
            cache_ttl: Duration::ZERO,
            ..sample()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("QUILL_CACHE_TTL_SECS"));
    }
}
