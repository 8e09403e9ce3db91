//! Runtime configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Every upstream base URL can be overridden so the binary can be
//! pointed at a self-hosted proxy or a local fake.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// OpenAI-compatible endpoint used for sample identification.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Perplexity endpoint used for web-backed video search.
pub const DEFAULT_PERPLEXITY_URL: &str = "https://api.perplexity.ai";

pub const DEFAULT_SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com/api";
pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_WIKIPEDIA_URL: &str = "https://en.wikipedia.org/api/rest_v1";

pub const DEFAULT_SAMPLE_MODEL: &str = "o3-mini";
pub const DEFAULT_VIDEO_MODEL: &str = "sonar";

/// Catalog response cache window.
pub const DEFAULT_CATALOG_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Hard budget for the encyclopedia bio fetch.
pub const DEFAULT_BIO_TIMEOUT: Duration = Duration::from_millis(1000);

pub const DEFAULT_BIO_MAX_CHARS: usize = 280;
pub const DEFAULT_GENRE_POOL_CAP: usize = 24;
pub const DEFAULT_AI_MAX_RETRIES: u32 = 3;
pub const DEFAULT_AI_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Whole-request timeout applied to every upstream HTTP client.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for a cover download feeding the dominant colour.
pub const DEFAULT_COVER_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client with a whole-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default HTTP client");
        reqwest::Client::new()
    })
}

/// A chat-completion provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Catalog client credentials and endpoints.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub accounts_url: String,
    pub api_url: String,
}

/// Acceptance thresholds and caps, one per consumer.
///
/// The video and sample thresholds are exclusive (`confidence > t`), the
/// discovery threshold is inclusive (`confidence >= t`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub video_threshold: f64,
    pub sample_threshold: f64,
    pub discovery_threshold: f64,
    pub genre_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video_threshold: 0.5,
            sample_threshold: 0.0,
            discovery_threshold: 0.8,
            genre_cap: DEFAULT_GENRE_POOL_CAP,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: ProviderConfig,
    pub perplexity: ProviderConfig,
    pub spotify: SpotifyConfig,
    pub wikipedia_url: String,
    pub catalog_cache_ttl: Duration,
    pub bio_timeout: Duration,
    pub bio_max_chars: usize,
    pub ai_max_retries: u32,
    pub ai_retry_delay: Duration,
    pub http_timeout: Duration,
    pub cover_timeout: Duration,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai: ProviderConfig {
                api_key: None,
                base_url: DEFAULT_OPENAI_URL.to_string(),
                model: DEFAULT_SAMPLE_MODEL.to_string(),
            },
            perplexity: ProviderConfig {
                api_key: None,
                base_url: DEFAULT_PERPLEXITY_URL.to_string(),
                model: DEFAULT_VIDEO_MODEL.to_string(),
            },
            spotify: SpotifyConfig {
                client_id: None,
                client_secret: None,
                accounts_url: DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string(),
                api_url: DEFAULT_SPOTIFY_API_URL.to_string(),
            },
            wikipedia_url: DEFAULT_WIKIPEDIA_URL.to_string(),
            catalog_cache_ttl: DEFAULT_CATALOG_CACHE_TTL,
            bio_timeout: DEFAULT_BIO_TIMEOUT,
            bio_max_chars: DEFAULT_BIO_MAX_CHARS,
            ai_max_retries: DEFAULT_AI_MAX_RETRIES,
            ai_retry_delay: DEFAULT_AI_RETRY_DELAY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            cover_timeout: DEFAULT_COVER_TIMEOUT,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from the process environment layered over an explicit env file.
    ///
    /// The file is read without touching the process environment; variables
    /// already set in the environment win.
    pub fn from_env_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut file_vars = HashMap::new();
        for item in dotenvy::from_path_iter(path.as_ref())? {
            let (key, value) = item?;
            file_vars.insert(key, value);
        }
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let pipeline = PipelineConfig {
            video_threshold: parse_or(&get, "VIDEO_CONFIDENCE_THRESHOLD", defaults.pipeline.video_threshold)?,
            sample_threshold: parse_or(&get, "SAMPLE_CONFIDENCE_THRESHOLD", defaults.pipeline.sample_threshold)?,
            discovery_threshold: parse_or(
                &get,
                "DISCOVERY_CONFIDENCE_THRESHOLD",
                defaults.pipeline.discovery_threshold,
            )?,
            genre_cap: parse_or(&get, "GENRE_POOL_CAP", defaults.pipeline.genre_cap)?,
        };
        for (key, value) in [
            ("VIDEO_CONFIDENCE_THRESHOLD", pipeline.video_threshold),
            ("SAMPLE_CONFIDENCE_THRESHOLD", pipeline.sample_threshold),
            ("DISCOVERY_CONFIDENCE_THRESHOLD", pipeline.discovery_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: format!("{} is outside [0, 1]", value),
                });
            }
        }

        Ok(Self {
            openai: ProviderConfig {
                api_key: get("OPENAI_API_KEY"),
                base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
                model: get("SAMPLE_MODEL").unwrap_or(defaults.openai.model),
            },
            perplexity: ProviderConfig {
                api_key: get("PERPLEXITY_API_KEY"),
                base_url: get("PERPLEXITY_BASE_URL").unwrap_or(defaults.perplexity.base_url),
                model: get("VIDEO_MODEL").unwrap_or(defaults.perplexity.model),
            },
            spotify: SpotifyConfig {
                client_id: get("SPOTIFY_CLIENT_ID"),
                client_secret: get("SPOTIFY_CLIENT_SECRET"),
                accounts_url: get("SPOTIFY_ACCOUNTS_URL").unwrap_or(defaults.spotify.accounts_url),
                api_url: get("SPOTIFY_API_URL").unwrap_or(defaults.spotify.api_url),
            },
            wikipedia_url: get("WIKIPEDIA_URL").unwrap_or(defaults.wikipedia_url),
            catalog_cache_ttl: Duration::from_secs(parse_or(
                &get,
                "CATALOG_CACHE_TTL_SECS",
                defaults.catalog_cache_ttl.as_secs(),
            )?),
            bio_timeout: Duration::from_millis(parse_or(
                &get,
                "BIO_TIMEOUT_MS",
                defaults.bio_timeout.as_millis() as u64,
            )?),
            bio_max_chars: parse_or(&get, "BIO_MAX_CHARS", defaults.bio_max_chars)?,
            ai_max_retries: parse_or(&get, "AI_MAX_RETRIES", defaults.ai_max_retries)?.max(1),
            ai_retry_delay: Duration::from_millis(parse_or(
                &get,
                "AI_RETRY_DELAY_MS",
                defaults.ai_retry_delay.as_millis() as u64,
            )?),
            http_timeout: Duration::from_secs(parse_or(
                &get,
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            cover_timeout: Duration::from_millis(parse_or(
                &get,
                "COVER_TIMEOUT_MS",
                defaults.cover_timeout.as_millis() as u64,
            )?),
            pipeline,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &'static str, default: T) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            message: e.to_string(),
        }),
    }
}
