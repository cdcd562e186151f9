// ── Device / sensor view ──
//
// A handle onto one store entry: the identifier plus a reference to the
// owning client. Every accessor reads the current entry, so a view never
// goes stale. Commands go through the gateway; only a confirmed command
// touches the store, and then only the commanded fields.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use tellstick_api::Params;

use crate::client::ClientInner;
use crate::model::{Entry, Field, Identifier, Method, SensorItem, describe_methods};

/// Shown for entries without a name.
pub const UNNAMED_DEVICE: &str = "NO NAME";

/// View of one device or sensor.
#[derive(Clone)]
pub struct Device {
    id: Identifier,
    client: Arc<ClientInner>,
}

impl Device {
    pub(crate) fn new(id: Identifier, client: Arc<ClientInner>) -> Self {
        Self { id, client }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    /// Snapshot of the underlying entry.
    pub fn entry(&self) -> Option<Entry> {
        self.client.store.get(self.id.as_str())
    }

    fn read<R>(&self, f: impl FnOnce(&Entry) -> Option<R>) -> Option<R> {
        self.client.store.with_entry(self.id.as_str(), f).flatten()
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> Option<String> {
        self.read(|e| e.name().map(str::to_owned))
    }

    /// Last known state as a [`Method`] flag value.
    pub fn state(&self) -> Option<u32> {
        self.read(|e| e.int(Field::State))
            .and_then(|s| u32::try_from(s).ok())
    }

    /// State value (dim level etc.); `"0"` when missing or undefined.
    pub fn statevalue(&self) -> String {
        self.read(|e| e.text(Field::StateValue))
            .filter(|v| !v.is_empty() && v != "unde")
            .unwrap_or_else(|| "0".to_owned())
    }

    pub fn battery(&self) -> Option<i64> {
        self.read(|e| e.int(Field::Battery))
    }

    pub fn unit(&self) -> Option<String> {
        self.read(|e| e.text(Field::Unit))
    }

    pub fn house(&self) -> Option<String> {
        self.read(|e| e.text(Field::House))
    }

    pub fn model(&self) -> Option<String> {
        self.read(|e| e.text(Field::Model))
    }

    pub fn protocol(&self) -> Option<String> {
        self.read(|e| e.text(Field::Protocol))
    }

    pub fn parameters(&self) -> Option<Vec<Value>> {
        self.read(|e| e.get(Field::Parameters)?.as_array().cloned())
    }

    pub fn client_id(&self) -> Option<String> {
        self.read(|e| e.text(Field::ClientId))
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.read(|e| e.int(Field::LastUpdated))
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Capability mask; `0` when unknown.
    pub fn methods(&self) -> u32 {
        self.read(|e| e.int(Field::Methods))
            .and_then(|m| u32::try_from(m).ok())
            .unwrap_or(0)
    }

    pub fn data(&self) -> Option<Vec<Value>> {
        self.read(|e| e.get(Field::Data)?.as_array().cloned())
    }

    pub fn sensor_id(&self) -> Option<String> {
        self.read(|e| e.text(Field::SensorId))
    }

    /// Any field of the entry by name.
    pub fn raw(&self, name: &str) -> Option<Value> {
        self.read(|e| e.raw(name).cloned())
    }

    pub fn is_sensor(&self) -> bool {
        self.read(|e| Some(e.is_sensor())).unwrap_or(false)
    }

    pub fn is_on(&self) -> bool {
        matches!(self.state().and_then(Method::from_bits), Some(Method::TurnOn | Method::Dim))
    }

    pub fn is_down(&self) -> bool {
        self.state().and_then(Method::from_bits) == Some(Method::Down)
    }

    pub fn dim_level(&self) -> Option<u8> {
        self.statevalue().parse().ok()
    }

    // ── Sensor readings ──────────────────────────────────────────────

    pub fn items(&self) -> Vec<SensorItem> {
        self.data()
            .unwrap_or_default()
            .iter()
            .filter_map(SensorItem::from_value)
            .collect()
    }

    /// The reading with this name and scale, if the sensor has one.
    pub fn item(&self, name: &str, scale: i64) -> Option<SensorItem> {
        self.items().into_iter().find(|i| i.matches(name, scale))
    }

    pub fn value(&self, name: &str, scale: i64) -> Option<String> {
        self.item(name, scale).map(|i| i.value)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn turn_on(&self) -> bool {
        self.execute(Method::TurnOn, Params::new(), None).await
    }

    pub async fn turn_off(&self) -> bool {
        self.execute(Method::TurnOff, Params::new(), None).await
    }

    pub async fn dim(&self, level: u8) -> bool {
        let params = Params::from([("level".to_owned(), level.to_string())]);
        self.execute(Method::Dim, params, Some(level.to_string()))
            .await
    }

    pub async fn up(&self) -> bool {
        self.execute(Method::Up, Params::new(), None).await
    }

    pub async fn down(&self) -> bool {
        self.execute(Method::Down, Params::new(), None).await
    }

    pub async fn stop(&self) -> bool {
        self.execute(Method::Stop, Params::new(), None).await
    }

    async fn execute(&self, method: Method, mut params: Params, statevalue: Option<String>) -> bool {
        params.insert("id".to_owned(), self.id.raw_id().to_owned());
        let path = format!("device/{}", method.api_name());
        if !self.client.gateway.execute(&path, params).await {
            return false;
        }

        let cached = self.client.store.update_entry(self.id.as_str(), |entry| {
            entry.set(Field::State, method.bits());
            if let Some(value) = statevalue {
                entry.set(Field::StateValue, value);
            }
        });
        if !cached {
            debug!(id = %self.id, "command confirmed for an uncached device");
        }
        true
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("id", &self.id).finish_non_exhaustive()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or_else(|| UNNAMED_DEVICE.to_owned());
        if self.is_sensor() {
            let items = self
                .items()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "Sensor #{:>9} {name:<20} ({items})", self.id.as_str())
        } else {
            write!(
                f,
                "Device #{:>9} {name:<20} ({}:{}) [{}]",
                self.id.as_str(),
                describe_methods(self.state().unwrap_or(0)),
                self.statevalue(),
                describe_methods(self.methods()),
            )
        }
    }
}
