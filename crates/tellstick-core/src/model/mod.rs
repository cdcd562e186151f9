// ── Domain model ──
//
// Store keys, cached records, command flags and sensor readings.

pub mod entry;
pub mod identifier;
pub mod method;
pub mod sensor;

pub use entry::{DeviceKey, Entry, Field, SensorKey};
pub use identifier::{Identifier, SENSOR_PREFIX};
pub use method::{Method, SUPPORTED_METHODS, describe_methods};
pub use sensor::SensorItem;
