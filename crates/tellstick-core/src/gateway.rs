// ── Request gateway ──
//
// Named operations on top of the transport session. Every call refreshes
// the session token first, uses the fixed request timeout, and treats an
// `error` field in the reply as a failure. Whatever went wrong (network,
// timeout, hub error payload, loopback routing) is logged once here and
// reported as `None` / `false`. A session that needs authorizing logs at
// error; everything else at warn.

use serde_json::Value;
use tracing::{Instrument, Span, debug, error, warn};

use tellstick_api::{Error as ApiError, Params, REQUEST_TIMEOUT, Session};

use crate::error::CoreError;
use crate::model::SUPPORTED_METHODS;

const LIST_DEVICES: &str = "devices/list";
const LIST_SENSORS: &str = "sensors/list";
const DEVICE_INFO: &str = "device/info";
const SENSOR_INFO: &str = "sensor/info";

/// Status value of a successful command reply.
pub const STATUS_SUCCESS: &str = "success";

pub struct Gateway {
    session: Session,
    span: Span,
}

impl Gateway {
    pub fn new(session: Session, span: Span) -> Self {
        Self { session, span }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Issue `path` and return the reply, or `None` after logging why not.
    pub async fn request(&self, path: &str, params: Params) -> Option<Value> {
        async {
            match self.try_request(path, &params).await {
                Ok(reply) => Some(reply),
                Err(e) if e.is_auth_failure() => {
                    error!(path, error = %CoreError::from(e), "request not authorized");
                    None
                }
                Err(e) => {
                    let transient = e.is_transient();
                    warn!(path, transient, error = %CoreError::from(e), "failed request");
                    None
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn try_request(&self, path: &str, params: &Params) -> Result<Value, ApiError> {
        self.session.maybe_refresh_token().await?;
        debug!(path, ?params, "request");
        let reply = self.session.request(path, params, REQUEST_TIMEOUT).await?;
        debug!(path, %reply, "response");

        if let Some(error) = reply.get("error") {
            let message = error
                .as_str()
                .map_or_else(|| error.to_string(), str::to_owned);
            return Err(ApiError::Api { message });
        }
        Ok(reply)
    }

    // ── Named operations ─────────────────────────────────────────────

    pub async fn list_devices(&self) -> Option<Vec<Value>> {
        let params = params([
            ("supportedMethods", SUPPORTED_METHODS.to_string()),
            ("includeIgnored", "0".into()),
        ]);
        let reply = self.request(LIST_DEVICES, params).await?;
        self.list_field(reply, "device")
    }

    pub async fn list_sensors(&self) -> Option<Vec<Value>> {
        let params = params([
            ("includeValues", "1".into()),
            ("includeScale", "1".into()),
            ("includeIgnored", "0".into()),
        ]);
        let reply = self.request(LIST_SENSORS, params).await?;
        self.list_field(reply, "sensor")
    }

    pub async fn device_info(&self, id: &str) -> Option<Value> {
        self.request(DEVICE_INFO, params([("id", id.to_owned())]))
            .await
    }

    pub async fn sensor_info(&self, id: &str) -> Option<Value> {
        self.request(SENSOR_INFO, params([("id", id.to_owned())]))
            .await
    }

    /// Run a command. True only if the hub confirmed it.
    pub async fn execute(&self, path: &str, params: Params) -> bool {
        let Some(reply) = self.request(path, params).await else {
            return false;
        };
        let ok = reply.get("status").and_then(Value::as_str) == Some(STATUS_SUCCESS);
        if !ok {
            self.span.in_scope(|| debug!(path, %reply, "command not confirmed"));
        }
        ok
    }

    fn list_field(&self, mut reply: Value, field: &str) -> Option<Vec<Value>> {
        match reply.get_mut(field).map(Value::take) {
            Some(Value::Array(items)) => Some(items),
            // null: nothing configured.
            Some(Value::Null) => Some(Vec::new()),
            other => {
                self.span.in_scope(|| {
                    warn!(field, reply = ?other, "list reply has no usable array");
                });
                None
            }
        }
    }
}

fn params<const N: usize>(pairs: [(&str, String); N]) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}
