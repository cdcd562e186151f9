// Local HTTP API session
//
// Talks directly to a TellStick ZNet / Net v2 on the LAN. Authorization
// is a two-step handshake: PUT /api/token to obtain a request token and
// the URL where the user approves it, then GET /api/token?token=.. to
// receive the bearer token. Bearer tokens expire and are renewed via
// /api/refreshToken once they are older than twelve hours.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::session::Params;
use crate::transport::{REQUEST_TIMEOUT, TransportConfig, json_body, transport_error};

const API_PATH: &str = "api/";
const TOKEN_PATH: &str = "api/token";
const REFRESH_TOKEN_PATH: &str = "api/refreshToken";

/// Bearer tokens older than this are refreshed before the next request.
pub const TOKEN_MAX_AGE: TimeDelta = TimeDelta::hours(12);

#[derive(Default)]
struct TokenState {
    request_token: Option<String>,
    access_token: Option<SecretString>,
    issued_at: Option<DateTime<Utc>>,
    /// A token handed in at construction gets one refresh on first use.
    initial_refresh: bool,
}

/// Bearer-token session against one hub's local API.
pub struct LocalSession {
    http: reqwest::Client,
    base_url: Url,
    application: String,
    timeout: Duration,
    state: Mutex<TokenState>,
}

impl LocalSession {
    /// Create a session for the hub at `host` (name or address, optional port).
    pub fn new(
        host: &str,
        application: String,
        access_token: Option<SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(&format!("http://{host}/"))?;
        let http = transport.build_client()?;
        let mut session = Self::with_client(http, base_url, application, access_token);
        session.timeout = transport.timeout;
        Ok(session)
    }

    /// Create a session with a pre-built client and base URL.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        application: String,
        access_token: Option<SecretString>,
    ) -> Self {
        let state = TokenState {
            initial_refresh: access_token.is_some(),
            access_token,
            ..TokenState::default()
        };
        Self {
            http,
            base_url,
            application,
            timeout: REQUEST_TIMEOUT,
            state: Mutex::new(state),
        }
    }

    /// Record when a token restored from storage was issued. A token of
    /// known age skips the first-use refresh and ages normally.
    pub fn with_token_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.issued_at = Some(issued_at);
        state.initial_refresh = false;
        self
    }

    fn state(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_authorized(&self) -> bool {
        self.state().access_token.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state()
            .access_token
            .as_ref()
            .map(|t| t.expose_secret().to_owned())
    }

    /// When the current bearer token was issued or last refreshed.
    pub fn token_issued_at(&self) -> Option<DateTime<Utc>> {
        self.state().issued_at
    }

    /// Request a token for this application and return the approval URL.
    pub async fn authorize_url(&self) -> Result<Url, Error> {
        let url = self.base_url.join(TOKEN_PATH)?;
        debug!(%url, "requesting local API token");

        let resp = self
            .http
            .put(url)
            .form(&[("app", self.application.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let body = json_body(resp, self.timeout).await?;

        let token = string_field(&body, "token").ok_or_else(|| Error::Authentication {
            message: format!("no request token in reply: {body}"),
        })?;
        let auth_url = string_field(&body, "authUrl").ok_or_else(|| Error::Authentication {
            message: format!("no authUrl in reply: {body}"),
        })?;

        self.state().request_token = Some(token);
        Ok(Url::parse(&auth_url)?)
    }

    /// Poll for the bearer token once the user has approved the request.
    ///
    /// Returns `Ok(false)` while approval is still pending.
    pub async fn authorize(&self) -> Result<bool, Error> {
        let request_token = self
            .state()
            .request_token
            .clone()
            .ok_or_else(|| Error::Authentication {
                message: "no request token; fetch the authorization URL first".into(),
            })?;

        let url = self.base_url.join(TOKEN_PATH)?;
        let resp = self
            .http
            .get(url)
            .query(&[("token", request_token.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let body = json_body(resp, self.timeout).await?;

        let Some(token) = string_field(&body, "token") else {
            debug!(reply = %body, "token not granted yet");
            return Ok(false);
        };
        log_expiry(&body);

        let mut state = self.state();
        state.access_token = Some(SecretString::from(token));
        state.issued_at = Some(Utc::now());
        state.initial_refresh = false;
        Ok(true)
    }

    /// Renew the bearer token.
    pub async fn refresh_access_token(&self) -> Result<(), Error> {
        let token = self.bearer()?;
        let url = self.base_url.join(REFRESH_TOKEN_PATH)?;
        debug!(%url, "refreshing local API token");

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        let body = json_body(resp, self.timeout).await?;

        if let Some(message) = string_field(&body, "error") {
            return Err(Error::Authentication { message });
        }
        let token = string_field(&body, "token").ok_or_else(|| Error::Authentication {
            message: format!("no token in refresh reply: {body}"),
        })?;
        log_expiry(&body);

        let mut state = self.state();
        state.access_token = Some(SecretString::from(token));
        state.issued_at = Some(Utc::now());
        Ok(())
    }

    /// Refresh the bearer token if it is older than [`TOKEN_MAX_AGE`].
    ///
    /// A token supplied at construction has an unknown age; it gets one
    /// refresh attempt on first use and a failure there is only logged.
    pub async fn maybe_refresh_token(&self) -> Result<(), Error> {
        let (initial, issued_at) = {
            let mut state = self.state();
            let initial = std::mem::take(&mut state.initial_refresh);
            (initial, state.issued_at)
        };

        if initial {
            if let Err(e) = self.refresh_access_token().await {
                warn!(error = %e, "failed to refresh access token");
            }
            return Ok(());
        }

        match issued_at {
            Some(at) if Utc::now() - at > TOKEN_MAX_AGE => self.refresh_access_token().await,
            _ => Ok(()),
        }
    }

    /// Bearer-authenticated GET against `api/{path}`.
    pub async fn request(
        &self,
        path: &str,
        params: &Params,
        timeout: Duration,
    ) -> Result<Value, Error> {
        let token = self.bearer()?;
        let url = self.base_url.join(API_PATH)?.join(path)?;
        debug!(%url, ?params, "local request");

        let resp = self
            .http
            .get(url)
            .query(params)
            .bearer_auth(token.expose_secret())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        json_body(resp, timeout).await
    }

    fn bearer(&self) -> Result<SecretString, Error> {
        self.state().access_token.clone().ok_or(Error::NotAuthorized)
    }

}

fn string_field(body: &Value, name: &str) -> Option<String> {
    body.get(name).and_then(Value::as_str).map(str::to_owned)
}

fn log_expiry(body: &Value) {
    let expires = body
        .get("expires")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    debug!(?expires, "token expires");
}
