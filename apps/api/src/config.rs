use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

/// Which storage implementation backs records, profiles, the token ledger and raw files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Postgres for records/profiles/ledger, S3 (or MinIO) for raw files.
    Postgres,
    /// Process-local maps. Local development only; nothing survives a restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!(
                "STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"
            )),
        }
    }
}

/// S3 / MinIO settings, only required for the Postgres backend.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub s3: Option<S3Config>,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub parse_max_chars: usize,
    pub max_upload_bytes: usize,
    pub default_parse_tokens: i64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend: StoreBackend = optional_env("STORE_BACKEND", "postgres").parse()?;

        let (database_url, s3) = match store_backend {
            StoreBackend::Postgres => (
                Some(require_env("DATABASE_URL")?),
                Some(S3Config {
                    bucket: require_env("S3_BUCKET")?,
                    endpoint: require_env("S3_ENDPOINT")?,
                    access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                    secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
                }),
            ),
            StoreBackend::Memory => (None, None),
        };

        Ok(Config {
            store_backend,
            database_url,
            s3,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: optional_env("LLM_BASE_URL", "https://api.groq.com/openai/v1"),
            llm_model: optional_env("LLM_MODEL", "llama-3.1-8b-instant"),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 60)?,
            llm_max_retries: parse_env("LLM_MAX_RETRIES", 2)?,
            parse_max_chars: parse_env("PARSE_MAX_CHARS", 60_000)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            default_parse_tokens: parse_env("DEFAULT_PARSE_TOKENS", 2)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
