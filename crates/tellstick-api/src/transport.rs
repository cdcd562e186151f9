// ── HTTP plumbing for the hub APIs ──
//
// Both HTTP sessions talk to the hub with a 10 s budget per call and an
// optional `X-Application` header naming the caller. Replies are JSON;
// undecodable bodies are kept verbatim for the error.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::Error;

/// Fixed timeout applied to every call against the cloud or local API.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("tellstick-rs/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    /// Sent as `X-Application` when present.
    pub application: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: REQUEST_TIMEOUT,
            application: None,
        }
    }
}

impl TransportConfig {
    /// Config carrying the caller's application name.
    pub fn with_application(application: Option<String>) -> Self {
        Self {
            application,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut headers = HeaderMap::new();
        if let Some(ref app) = self.application {
            let value = HeaderValue::from_str(app)
                .map_err(|e| Error::ClientSetup(format!("invalid application name {app:?}: {e}")))?;
            headers.insert("X-Application", value);
        }

        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::ClientSetup(e.to_string()))
    }
}

/// Map a reqwest failure onto the crate error, surfacing timeouts explicitly.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(err)
    }
}

/// Read a JSON body, keeping the raw text for diagnostics on failure.
pub(crate) async fn json_body(
    resp: reqwest::Response,
    timeout: Duration,
) -> Result<serde_json::Value, Error> {
    let resp = resp
        .error_for_status()
        .map_err(|e| transport_error(e, timeout))?;
    let body = resp.text().await.map_err(|e| transport_error(e, timeout))?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
