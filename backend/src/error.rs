//! Error types for the Samplefindr enrichment pipeline.
//!
//! Every external call is a containment boundary: the clients below return
//! these errors from their internal `try_*` helpers, and the public contracts
//! (`resolve`, `find_video`, `lookup`) collapse them into empty defaults.
//!
//! - [`InputError`] - Rejected before any network call
//! - [`AiError`] - Chat-completion upstreams (sample identification, video search)
//! - [`CatalogError`] - Music catalog, encyclopedia and cover image fetches
//! - [`ConfigError`] - Missing or malformed configuration
//! - [`ServerError`] - HTTP server startup
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors reported synchronously to the immediate caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Query was empty after trimming.
    #[error("Missing or invalid query parameter")]
    EmptyQuery,

    /// Title or artist missing for a per-track lookup.
    #[error("Missing title or artist parameter")]
    MissingTitleOrArtist,
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Errors from a chat-completion upstream.
#[derive(Debug, Error)]
pub enum AiError {
    /// Missing API key.
    #[error("Missing API key: {0}")]
    MissingApiKey(&'static str),

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Upstream answered with a non-success status.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Response arrived but carried no content.
    #[error("Empty response from upstream")]
    EmptyResponse,

    /// Response content was not the expected JSON.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

impl AiError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::RequestFailed(_) | AiError::ApiError { .. } | AiError::Timeout
        )
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::RequestFailed(err.to_string())
        }
    }
}

// =============================================================================
// Catalog Errors
// =============================================================================

/// Errors from the catalog metadata provider and its satellites.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Missing client credentials.
    #[error("Missing catalog credentials: {0}")]
    MissingCredentials(&'static str),

    /// Token exchange was refused.
    #[error("Catalog token request failed: {0}")]
    Token(String),

    /// HTTP request failed.
    #[error("Catalog request failed: {0}")]
    RequestFailed(String),

    /// Non-success status.
    #[error("Catalog returned HTTP {0}")]
    Status(u16),

    /// Response was not JSON or had the wrong shape.
    #[error("Invalid catalog response: {0}")]
    InvalidJson(String),

    /// Search yielded no match.
    #[error("No track found")]
    NotFound,

    /// Cover image could not be decoded.
    #[error("Image decode failed: {0}")]
    Image(String),

    /// Timeout.
    #[error("Catalog request timed out")]
    Timeout,
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else if err.is_decode() {
            CatalogError::InvalidJson(err.to_string())
        } else {
            CatalogError::RequestFailed(err.to_string())
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the `.env` file.
    #[error("Failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    /// A value could not be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    /// AI upstream not configured.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Catalog upstream not configured.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bind or serve failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let ai_err = AiError::MissingApiKey("OPENAI_API_KEY");
        let config_err: ConfigError = ai_err.into();
        assert!(config_err.to_string().contains("OPENAI_API_KEY"));

        let config_err: ConfigError = CatalogError::MissingCredentials("SPOTIFY_CLIENT_ID").into();
        let server_err: ServerError = config_err.into();
        assert!(server_err.to_string().contains("SPOTIFY_CLIENT_ID"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AiError::Timeout.is_retryable());
        assert!(AiError::ApiError { status: 503, message: "busy".into() }.is_retryable());
        assert!(!AiError::InvalidJson("eof".into()).is_retryable());
        assert!(!AiError::MissingApiKey("X").is_retryable());
    }

    #[test]
    fn test_input_error_messages_match_wire_text() {
        assert_eq!(InputError::EmptyQuery.to_string(), "Missing or invalid query parameter");
        assert_eq!(
            InputError::MissingTitleOrArtist.to_string(),
            "Missing title or artist parameter"
        );
    }
}
