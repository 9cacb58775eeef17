use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::clients::openai::DEFAULT_BASE_URL;
use crate::error::ConfigError;
use crate::quota::{QuotaPolicy, QuotaScope};

/// Trait for types that can retrieve their configuration key from environment variables
pub trait KeyFromEnv {
    /// The environment variable name for this client's API key
    const KEY_NAME: &'static str;

    /// Find the API key by checking environment variables first, then .env file
    fn find_key() -> Option<String> {
        // First try to load .env file (silently fail if not found)
        let _ = dotenvy::dotenv();

        env::var(Self::KEY_NAME).ok().filter(|k| !k.is_empty())
    }

    fn require_key() -> Result<String, ConfigError> {
        Self::find_key().ok_or(ConfigError::Missing(Self::KEY_NAME))
    }
}

pub const BIND_VAR: &str = "DOC_QUIZ_BIND";
pub const DATABASE_URL_VAR: &str = "DOC_QUIZ_DATABASE_URL";
pub const QUOTA_CEILING_VAR: &str = "DOC_QUIZ_QUOTA_CEILING";
pub const QUOTA_SCOPE_VAR: &str = "DOC_QUIZ_QUOTA_SCOPE";
pub const MODEL_VAR: &str = "DOC_QUIZ_MODEL";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const TRANSCRIPT_DIR_VAR: &str = "DOC_QUIZ_TRANSCRIPT_DIR";

/// Process-level settings. Built once in `main` and threaded into the
/// components that need them.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub database_url: String,
    pub quota: QuotaPolicy,
    pub model: String,
    pub base_url: String,
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: "sqlite://doc-quiz.db?mode=rwc".to_string(),
            quota: QuotaPolicy::default(),
            model: "gpt-4o-mini".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            transcript_dir: None,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup(BIND_VAR) {
            config.bind = bind
                .parse()
                .map_err(|_| ConfigError::Invalid { key: BIND_VAR, value: bind })?;
        }
        if let Some(url) = lookup(DATABASE_URL_VAR) {
            config.database_url = url;
        }
        if let Some(ceiling) = lookup(QUOTA_CEILING_VAR) {
            config.quota.ceiling = ceiling
                .parse()
                .map_err(|_| ConfigError::Invalid { key: QUOTA_CEILING_VAR, value: ceiling })?;
        }
        if let Some(scope) = lookup(QUOTA_SCOPE_VAR) {
            config.quota.scope = QuotaScope::parse(&scope)
                .ok_or(ConfigError::Invalid { key: QUOTA_SCOPE_VAR, value: scope })?;
        }
        if let Some(model) = lookup(MODEL_VAR) {
            config.model = model;
        }
        if let Some(base_url) = lookup(BASE_URL_VAR) {
            config.base_url = base_url;
        }
        config.transcript_dir = lookup(TRANSCRIPT_DIR_VAR).map(PathBuf::from);

        Ok(config)
    }
}
