use std::time::Duration;

use anyhow::{Context, Result};

/// S3-compatible blob storage credentials. Only used when all four values are set.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Client configuration loaded from environment variables.
/// Only the backend endpoint and its anon key are required.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub database_url: Option<String>,
    pub resume_bucket: String,
    pub s3: Option<S3Config>,
    pub oauth_callback_port: u16,
    pub http_timeout: Duration,
    pub mock_analysis_delay: Duration,
    pub mock_matching_delay: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match (
            optional_env("S3_ENDPOINT"),
            optional_env("S3_REGION"),
            optional_env("AWS_ACCESS_KEY_ID"),
            optional_env("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(endpoint), Some(region), Some(access_key_id), Some(secret_access_key)) => {
                Some(S3Config {
                    endpoint,
                    region,
                    access_key_id,
                    secret_access_key,
                })
            }
            _ => None,
        };

        Ok(Config {
            supabase_url: require_env("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: require_env("SUPABASE_ANON_KEY")?,
            database_url: optional_env("DATABASE_URL"),
            resume_bucket: optional_env("RESUME_BUCKET").unwrap_or_else(|| "resumes".to_string()),
            s3,
            oauth_callback_port: parse_env("OAUTH_CALLBACK_PORT", 54321)?,
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)?),
            mock_analysis_delay: Duration::from_millis(parse_env("MOCK_ANALYSIS_DELAY_MS", 0)?),
            mock_matching_delay: Duration::from_millis(parse_env("MOCK_MATCHING_DELAY_MS", 0)?),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}
