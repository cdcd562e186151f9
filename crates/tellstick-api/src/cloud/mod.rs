// Telldus Live (cloud) session
//
// Three-legged OAuth 1.0: fetch a request token, send the user to the
// authorize URL, exchange the request token for a long-lived access
// token + secret. Every API call is signed with the held credentials.

mod oauth;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::session::Params;
use crate::transport::{TransportConfig, json_body, transport_error};

use oauth::{Consumer, TokenPair, authorization_header, parse_token_reply};

/// Root of the Telldus Live service.
pub const LIVE_BASE_URL: &str = "https://api.telldus.com/";

const API_PATH: &str = "json/";
const REQUEST_TOKEN_PATH: &str = "oauth/requestToken";
const AUTHORIZE_PATH: &str = "oauth/authorize";
const ACCESS_TOKEN_PATH: &str = "oauth/accessToken";

#[derive(Default)]
struct Tokens {
    request: Option<TokenPair>,
    access: Option<TokenPair>,
}

/// Signed-request session against Telldus Live.
pub struct CloudSession {
    http: reqwest::Client,
    base_url: Url,
    consumer: Consumer,
    timeout: Duration,
    tokens: Mutex<Tokens>,
}

impl CloudSession {
    /// Create a session from the application key pair and, if already
    /// granted, the access token + secret.
    pub fn new(
        public_key: String,
        private_key: SecretString,
        access: Option<(String, SecretString)>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = Url::parse(LIVE_BASE_URL)?;
        let mut session = Self::with_client(http, base_url, public_key, private_key, access);
        session.timeout = transport.timeout;
        Ok(session)
    }

    /// Create a session with a pre-built client and base URL.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        public_key: String,
        private_key: SecretString,
        access: Option<(String, SecretString)>,
    ) -> Self {
        let tokens = Tokens {
            request: None,
            access: access.map(|(token, secret)| TokenPair { token, secret }),
        };
        Self {
            http,
            base_url,
            consumer: Consumer {
                key: public_key,
                secret: private_key,
            },
            timeout: crate::transport::REQUEST_TIMEOUT,
            tokens: Mutex::new(tokens),
        }
    }

    fn tokens(&self) -> MutexGuard<'_, Tokens> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_authorized(&self) -> bool {
        self.tokens().access.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens().access.as_ref().map(|t| t.token.clone())
    }

    pub fn access_token_secret(&self) -> Option<SecretString> {
        self.tokens().access.as_ref().map(|t| t.secret.clone())
    }

    /// Fetch a request token and return the URL where the user grants access.
    pub async fn authorize_url(&self) -> Result<Url, Error> {
        debug!("fetching request token");
        let request = self.fetch_token(REQUEST_TOKEN_PATH, None).await?;
        debug!("got request token");

        let mut url = self.base_url.join(AUTHORIZE_PATH)?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &request.token);
        self.tokens().request = Some(request);
        Ok(url)
    }

    /// Exchange the granted request token for an access token + secret.
    pub async fn authorize(&self) -> Result<bool, Error> {
        let request = self
            .tokens()
            .request
            .clone()
            .ok_or_else(|| Error::Authentication {
                message: "no request token; fetch the authorization URL first".into(),
            })?;

        debug!("fetching access token");
        let access = self.fetch_token(ACCESS_TOKEN_PATH, Some(&request)).await?;
        debug!("got access token");

        let mut tokens = self.tokens();
        tokens.request = None;
        tokens.access = Some(access);
        Ok(true)
    }

    /// Signed GET against `json/{path}`.
    pub async fn request(
        &self,
        path: &str,
        params: &Params,
        timeout: Duration,
    ) -> Result<Value, Error> {
        let access = self.tokens().access.clone().ok_or(Error::NotAuthorized)?;
        let url = self.base_url.join(API_PATH)?.join(path)?;
        debug!(%url, ?params, "cloud request");

        let resp = self
            .http
            .get(url)
            .query(params)
            .header(AUTHORIZATION, authorization_header(&self.consumer, Some(&access)))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        json_body(resp, timeout).await
    }

    async fn fetch_token(&self, path: &str, token: Option<&TokenPair>) -> Result<TokenPair, Error> {
        let url = self.base_url.join(path)?;
        let resp = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization_header(&self.consumer, token))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("token request failed (HTTP {status}): {body}"),
            });
        }

        parse_token_reply(&body).ok_or_else(|| Error::Authentication {
            message: format!("malformed token reply: {body}"),
        })
    }
}
