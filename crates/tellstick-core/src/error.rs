// ── Core error types ──
//
// Only configuration and lifecycle problems reach callers as errors.
// Request failures are turned into `CoreError` inside the gateway, logged,
// and reported as `None` / `false`. The `From<tellstick_api::Error>` impl
// translates transport-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Operation not supported: {operation}")]
    NotSupported { operation: String },

    #[error("Asynchronous listener already started")]
    AlreadyListening,

    // ── Request errors ───────────────────────────────────────────────
    #[error("Authorization failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Invalid operation: {path}")]
    InvalidOperation { path: String },

    /// The hub answered with an `error` field.
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    /// A reply that parsed but lacked the expected shape.
    #[error("Unexpected reply: {message}")]
    UnexpectedReply { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tellstick_api::Error> for CoreError {
    fn from(err: tellstick_api::Error) -> Self {
        match err {
            tellstick_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            tellstick_api::Error::NotAuthorized => CoreError::AuthenticationFailed {
                message: "session is not authorized".into(),
            },
            tellstick_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            tellstick_api::Error::InvalidOperation { path } => {
                CoreError::InvalidOperation { path }
            }
            tellstick_api::Error::Api { message } => CoreError::Rejected { message },
            tellstick_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tellstick_api::Error::ClientSetup(message) => CoreError::Config {
                message: format!("HTTP client setup failed: {message}"),
            },
            tellstick_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            tellstick_api::Error::Deserialization { message, body: _ } => {
                CoreError::UnexpectedReply { message }
            }
            tellstick_api::Error::Discovery(e) => CoreError::Api {
                message: format!("Discovery failed: {e}"),
                status: None,
            },
        }
    }
}
