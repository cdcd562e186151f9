// ── Store identity ──
//
// Devices and sensors live in separate numeric id spaces on the hub, so
// the two can collide. Sensor keys carry a leading `_` to keep them apart.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker prepended to a sensor's numeric id.
pub const SENSOR_PREFIX: char = '_';

/// Key of one entry in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Key for a device with the given hub id.
    pub fn device(raw: impl fmt::Display) -> Self {
        Self(raw.to_string())
    }

    /// Key for a sensor with the given hub id.
    pub fn sensor(raw: impl fmt::Display) -> Self {
        Self(format!("{SENSOR_PREFIX}{raw}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key lives in the sensor namespace.
    pub fn is_sensor_key(&self) -> bool {
        self.0.starts_with(SENSOR_PREFIX)
    }

    /// The hub's own id, without the sensor marker.
    pub fn raw_id(&self) -> &str {
        self.0.strip_prefix(SENSOR_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<&Identifier> for Identifier {
    fn from(id: &Identifier) -> Self {
        id.clone()
    }
}
