// ── Cached device / sensor record ──
//
// Hub records are loosely typed JSON objects and differ between the
// cloud API, the local API and the device manager. An `Entry` keeps the
// object as-is and exposes the fields the core understands through the
// `Field` table. Anything else stays reachable through `raw()`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ── Field ───────────────────────────────────────────────────────────

/// Record fields with first-class accessors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Field {
    Id,
    Name,
    State,
    StateValue,
    Battery,
    Unit,
    House,
    Model,
    Protocol,
    Parameters,
    #[strum(serialize = "client_id")]
    ClientId,
    #[strum(serialize = "lastUpdated")]
    LastUpdated,
    Methods,
    Data,
    #[strum(serialize = "sensorId")]
    SensorId,
}

impl Field {
    /// Key of this field in the JSON record.
    pub fn key(self) -> &'static str {
        self.into()
    }
}

// ── Match keys ──────────────────────────────────────────────────────

/// `(protocol, model, sensorId)`: how an async sensor packet is tied to
/// a cached sensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorKey {
    pub protocol: String,
    pub model: String,
    pub sensor_id: String,
}

/// `(house, unit)` from a device's `parameters` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceKey {
    pub house: String,
    pub unit: String,
}

// ── Entry ───────────────────────────────────────────────────────────

/// One cached record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry(Map<String, Value>);

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object. `None` for any other JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.0.get(field.key())
    }

    /// Any field by name, including ones without an accessor.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(field.key())
    }

    pub fn set(&mut self, field: Field, value: impl Into<Value>) {
        self.0.insert(field.key().to_owned(), value.into());
    }

    pub fn set_raw(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Field rendered as a string; numbers are formatted, other JSON
    /// types yield `None`.
    pub fn text(&self, field: Field) -> Option<String> {
        self.get(field).and_then(scalar_string)
    }

    /// Field as an integer; numeric strings are accepted.
    pub fn int(&self, field: Field) -> Option<i64> {
        self.get(field).and_then(scalar_int)
    }

    pub fn id(&self) -> Option<String> {
        self.text(Field::Id)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(Field::Name).and_then(Value::as_str)
    }

    /// A record carrying `data` is a sensor.
    pub fn is_sensor(&self) -> bool {
        self.contains(Field::Data)
    }

    /// Whether `data` holds at least one reading.
    pub fn has_data(&self) -> bool {
        match self.get(Field::Data) {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    pub fn sensor_key(&self) -> Option<SensorKey> {
        Some(SensorKey {
            protocol: self.text(Field::Protocol)?,
            model: self.text(Field::Model)?,
            sensor_id: self.text(Field::SensorId)?,
        })
    }

    /// `(house, unit)` from the `parameters` list. Later duplicates win.
    pub fn device_key(&self) -> Option<DeviceKey> {
        let params = self.get(Field::Parameters)?.as_array()?;
        let mut house = None;
        let mut unit = None;
        for param in params {
            let value = param.get("value").and_then(scalar_string);
            match param.get("name").and_then(Value::as_str) {
                Some("house") => house = value,
                Some("unit") => unit = value,
                _ => {}
            }
        }
        Some(DeviceKey {
            house: house?,
            unit: unit?,
        })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Entry {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ── Scalar normalisation ────────────────────────────────────────────

/// Strings pass through, numbers are formatted. Hub records mix
/// `"id": 12` and `"id": "12"`, so keys are always compared as strings.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn scalar_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
