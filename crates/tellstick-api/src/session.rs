// Transport session: one contract over the three hub transports.
//
// The variant is chosen once, when the session is built, and never
// changes afterwards. Authorization failures are logged here and
// surface as `None` / `false`; request failures are returned as errors
// for the gateway to normalise.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use strum::{Display, IntoStaticStr};
use tracing::{debug, error};
use url::Url;

use crate::cloud::CloudSession;
use crate::error::Error;
use crate::local::LocalSession;
use crate::loopback::LoopbackSession;

/// Query parameters for a named remote operation.
pub type Params = BTreeMap<String, String>;

/// Which transport a [`Session`] speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SessionKind {
    Cloud,
    Local,
    Loopback,
}

/// A transport session against a Telldus hub.
pub enum Session {
    /// Telldus Live, OAuth-signed requests.
    Cloud(CloudSession),
    /// Per-hub local HTTP API, bearer token.
    Local(LocalSession),
    /// In-process adapter over a local device manager.
    Loopback(LoopbackSession),
}

impl Session {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Cloud(_) => SessionKind::Cloud,
            Self::Local(_) => SessionKind::Local,
            Self::Loopback(_) => SessionKind::Loopback,
        }
    }

    /// Start the authorization flow and return the URL the user must visit.
    ///
    /// `None` when the transport has no authorization step, or when the
    /// request token could not be obtained (the failure is logged).
    pub async fn authorize_url(&self) -> Option<Url> {
        let result = match self {
            Self::Cloud(s) => s.authorize_url().await,
            Self::Local(s) => s.authorize_url().await,
            Self::Loopback(_) => return None,
        };
        result
            .inspect_err(|e| error!(error = %e, "failed to retrieve authorization URL"))
            .ok()
    }

    /// Complete the authorization flow started by [`authorize_url`](Self::authorize_url).
    pub async fn authorize(&self) -> bool {
        let result = match self {
            Self::Cloud(s) => s.authorize().await,
            Self::Local(s) => s.authorize().await,
            Self::Loopback(_) => Ok(true),
        };
        match result {
            Ok(authorized) => {
                debug!(authorized, "authorization finished");
                authorized
            }
            Err(e) => {
                error!(error = %e, "failed to authorize");
                false
            }
        }
    }

    pub fn is_authorized(&self) -> bool {
        match self {
            Self::Cloud(s) => s.is_authorized(),
            Self::Local(s) => s.is_authorized(),
            Self::Loopback(_) => true,
        }
    }

    /// Refresh credentials if they are about to go stale.
    ///
    /// Only the local transport has expiring tokens; the others are no-ops.
    pub async fn maybe_refresh_token(&self) -> Result<(), Error> {
        match self {
            Self::Local(s) => s.maybe_refresh_token().await,
            Self::Cloud(_) | Self::Loopback(_) => Ok(()),
        }
    }

    /// Issue a named remote operation (e.g. `devices/list`).
    pub async fn request(
        &self,
        path: &str,
        params: &Params,
        timeout: Duration,
    ) -> Result<Value, Error> {
        match self {
            Self::Cloud(s) => s.request(path, params, timeout).await,
            Self::Local(s) => s.request(path, params, timeout).await,
            Self::Loopback(s) => s.request(path, params),
        }
    }

    /// Current access token, if the transport holds one.
    pub fn access_token(&self) -> Option<String> {
        match self {
            Self::Cloud(s) => s.access_token(),
            Self::Local(s) => s.access_token(),
            Self::Loopback(_) => None,
        }
    }

    /// Current access token secret (cloud only).
    pub fn access_token_secret(&self) -> Option<secrecy::SecretString> {
        match self {
            Self::Cloud(s) => s.access_token_secret(),
            Self::Local(_) | Self::Loopback(_) => None,
        }
    }
}

impl From<CloudSession> for Session {
    fn from(s: CloudSession) -> Self {
        Self::Cloud(s)
    }
}

impl From<LocalSession> for Session {
    fn from(s: LocalSession) -> Self {
        Self::Local(s)
    }
}

impl From<LoopbackSession> for Session {
    fn from(s: LoopbackSession) -> Self {
        Self::Loopback(s)
    }
}
