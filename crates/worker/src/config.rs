//! Worker configuration, read once from the environment at startup.

use std::str::FromStr;
use std::time::Duration;

use scrub_ai::{GenerationSettings, RetryPolicy};
use scrub_infra::{PollerConfig, RunnerConfig, SmtpSettings};
use scrub_observability::LogFormat;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub url: String,
    pub key: String,
    pub input_bucket: String,
    pub output_bucket: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub poller: PollerConfig,
    /// `None` when no SMTP username is configured; notices are then only logged.
    pub smtp: Option<SmtpSettings>,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let generation = GenerationSettings {
            model: env.string_or("ANALYSIS_MODEL", "sonar"),
            temperature: env.parse_or("ANALYSIS_TEMPERATURE", 0.3_f32)?,
            max_tokens: env.parse_or("ANALYSIS_MAX_TOKENS", 2000_u32)?,
        };

        let batch_size: usize = env.parse_or("BATCH_SIZE", 3)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "BATCH_SIZE",
                value: "0".to_string(),
            });
        }
        let max_attempts: u32 = env.parse_or("MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }
        let retry = RetryPolicy::new(
            max_attempts,
            Duration::from_secs(env.parse_or("BACKOFF_BASE_SECS", 1)?),
        );

        let runner = RunnerConfig {
            batch_size,
            inter_batch_delay: Duration::from_millis(env.parse_or("INTER_BATCH_DELAY_MS", 1400)?),
            retry,
            generation: generation.clone(),
        };

        let poller = PollerConfig {
            poll_interval: Duration::from_secs(env.parse_or("POLL_INTERVAL_SECS", 10)?),
            error_interval: Duration::from_secs(env.parse_or("ERROR_INTERVAL_SECS", 30)?),
            runner,
        };

        let smtp = match env.optional("SMTP_USERNAME") {
            Some(username) => Some(SmtpSettings {
                host: env.string_or("SMTP_HOST", "smtp.gmail.com"),
                port: env.parse_or("SMTP_PORT", 587)?,
                username,
                password: env.required("SMTP_PASSWORD")?,
                from: env.optional("SMTP_FROM"),
            }),
            None => None,
        };

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            storage: StorageConfig {
                url: env.required("STORAGE_URL")?,
                key: env.required("STORAGE_KEY")?,
                input_bucket: env.string_or("INPUT_BUCKET", "uploads"),
                output_bucket: env.string_or("OUTPUT_BUCKET", "results"),
            },
            analysis: AnalysisConfig {
                url: env.string_or("ANALYSIS_API_URL", "https://api.perplexity.ai/chat/completions"),
                api_key: env.required("ANALYSIS_API_KEY")?,
                timeout: Duration::from_secs(env.parse_or("ANALYSIS_TIMEOUT_SECS", 60)?),
                generation,
            },
            poller,
            smtp,
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Json)?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
            None => Ok(default),
        }
    }
}
