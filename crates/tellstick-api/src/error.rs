use thiserror::Error;

/// Top-level error type for the `tellstick-api` crate.
///
/// Covers every failure mode of the three transports: authorization,
/// HTTP transport, error payloads from the hub, loopback routing, and
/// discovery. `tellstick-core` folds these into logged, non-success
/// results; only configuration problems ever reach the caller as errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authorization ───────────────────────────────────────────────
    /// Token handshake failed (rejected request token, missing fields, etc.)
    #[error("Authorization failed: {message}")]
    Authentication { message: String },

    /// A signed or bearer request was attempted without credentials.
    #[error("Session is not authorized")]
    NotAuthorized,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, bad status).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The HTTP client could not be set up (bad header value, TLS backend).
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    // ── Hub replies ─────────────────────────────────────────────────
    /// The reply carried an `error` field.
    #[error("API error: {message}")]
    Api { message: String },

    /// The reply body was not the JSON shape we expected.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Loopback ────────────────────────────────────────────────────
    /// Unrecognised path segment or object kind for the in-process transport.
    #[error("Invalid operation: {path}")]
    InvalidOperation { path: String },

    // ── Discovery ───────────────────────────────────────────────────
    /// Socket error while broadcasting or receiving discovery replies.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if re-running the authorization flow might resolve it.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotAuthorized)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
