//! Process configuration.
//!
//! Everything is read from the environment once, at startup, into plain
//! structs that are then handed to the components that need them. Nothing
//! below the binaries' `main` touches `std::env`.

use crate::error::ConfigError;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const TEMPERATURE: f32 = 0.1;
pub const MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PREVIEW_CHARS: usize = 1000;

/// Settings for the chat-completion client.
#[derive(Clone)]
pub struct AnswerServiceConfig {
    /// `None` is allowed: the client reports the missing credential per call.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for AnswerServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for AnswerServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerServiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnswerServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeout_secs = parse_var("PDF_QA_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            api_key: var("GROQ_API_KEY"),
            base_url: var("GROQ_BASE_URL").unwrap_or(defaults.base_url),
            model: var("PDF_QA_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(timeout_secs),
            ..defaults
        })
    }
}

/// Settings for the session controller and its upload store.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub temp_dir: PathBuf,
    pub preview_chars: usize,
    /// Upper bound on context tokens sent to the model. `None` sends the
    /// whole document.
    pub context_token_budget: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::temp_dir(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            context_token_budget: None,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            temp_dir: var("PDF_QA_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            preview_chars: parse_var("PDF_QA_PREVIEW_CHARS")?.unwrap_or(defaults.preview_chars),
            context_token_budget: parse_var("PDF_QA_CONTEXT_TOKENS")?,
        })
    }
}

/// Everything the library needs, bundled for the binaries.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub answer_service: AnswerServiceConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            answer_service: AnswerServiceConfig::from_env()?,
            session: SessionConfig::from_env()?,
        })
    }
}

/// Non-empty value of an environment variable.
pub fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional environment variable, failing only when it is set to
/// something unparsable.
pub fn parse_var<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        None => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(|e| ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
