// ── Sensor readings ──
//
// A sensor's `data` array holds one object per reading:
// `{"name": "temp", "value": "21.5", "scale": "0", ...}`. Items are
// rebuilt from the cached entry on every read and never stored.

use std::fmt;

use serde_json::{Map, Value};

use super::entry::{scalar_int, scalar_string};

// ── Sensor types ────────────────────────────────────────────────────

pub const TEMPERATURE: &str = "temperature";
pub const HUMIDITY: &str = "humidity";
pub const RAINRATE: &str = "rrate";
pub const RAINTOTAL: &str = "rtot";
pub const WINDDIRECTION: &str = "wdir";
pub const WINDAVERAGE: &str = "wavg";
pub const WINDGUST: &str = "wgust";
pub const UV: &str = "uv";
pub const WATT: &str = "watt";
pub const LUMINANCE: &str = "lum";
pub const DEW_POINT: &str = "dewp";
pub const BAROMETRIC_PRESSURE: &str = "barpress";

// ── Battery levels ──────────────────────────────────────────────────

pub const BATTERY_LOW: i64 = 255;
pub const BATTERY_UNKNOWN: i64 = 254;
pub const BATTERY_OK: i64 = 253;

/// One reading of a sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorItem {
    pub name: String,
    pub value: String,
    /// Unit selector; `None` when the hub sent something non-numeric.
    pub scale: Option<i64>,
    /// Remaining fields (`lastUpdated`, `max`, `min`, ...).
    pub extra: Map<String, Value>,
}

impl SensorItem {
    /// Build from one `data` element. Elements without a name are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let mut extra = value.as_object()?.clone();
        let name = extra.remove("name").as_ref().and_then(scalar_string)?;
        let value = extra
            .remove("value")
            .as_ref()
            .and_then(scalar_string)
            .unwrap_or_default();
        let scale = extra.remove("scale").as_ref().and_then(scalar_int);
        Some(Self {
            name,
            value,
            scale,
            extra,
        })
    }

    pub fn matches(&self, name: &str, scale: i64) -> bool {
        self.name == name && self.scale == Some(scale)
    }
}

impl fmt::Display for SensorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
