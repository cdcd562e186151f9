// Loopback session over a local device manager
//
// Used when there is no network hub API to talk to: requests such as
// `devices/list` or `device/turnOn` are answered in-process by the
// device manager that owns the raw radio-protocol devices, and the
// result is shaped like the JSON the HTTP APIs would have returned.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::Error;
use crate::session::Params;

/// Intake function for asynchronous packets. Called on the device
/// manager's own thread.
pub type PacketCallback = Box<dyn Fn(Value) + Send + Sync + 'static>;

/// Command names accepted under `device/{command}`.
const COMMANDS: &[&str] = &[
    "turnOn",
    "turnOff",
    "bell",
    "toggle",
    "dim",
    "learn",
    "up",
    "down",
    "stop",
    "rgbw",
    "thermostat",
];

/// The local device-manager collaborator.
///
/// Records are loosely typed JSON objects in the same shape the hub APIs
/// use (`id`, `name`, `state`, `parameters`, `data`, ...). Lookups return
/// `None` for unknown ids and for ids of the other kind (a sensor id
/// passed to [`get_device`](Self::get_device) and vice versa).
pub trait DeviceManager: Send + Sync {
    fn list_devices(&self) -> Vec<Value>;

    fn list_sensors(&self) -> Vec<Value>;

    fn get_device(&self, id: &str) -> Option<Value>;

    fn get_sensor(&self, id: &str) -> Option<Value>;

    /// Send `command` (an API method name such as `turnOn`) to a device.
    /// Returns `false` if the manager refused the command.
    fn execute_command(&self, id: &str, command: &str, params: &Params) -> bool;

    /// Register a device the server knows about, so that packets for it
    /// can be decoded.
    fn add_device(&self, record: Value);

    /// Start delivering asynchronous packets to `on_packet`.
    fn async_listen(&self, on_packet: PacketCallback);
}

/// In-process transport answering API paths from a [`DeviceManager`].
#[derive(Clone)]
pub struct LoopbackSession {
    manager: Arc<dyn DeviceManager>,
}

impl LoopbackSession {
    pub fn new(manager: Arc<dyn DeviceManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<dyn DeviceManager> {
        &self.manager
    }

    /// Route `kind/action` to the device manager.
    pub fn request(&self, path: &str, params: &Params) -> Result<Value, Error> {
        debug!(path, ?params, "loopback request");
        let invalid = || Error::InvalidOperation {
            path: path.to_owned(),
        };

        let mut segments = path.trim_matches('/').split('/');
        let (Some(kind), Some(action), None) = (segments.next(), segments.next(), segments.next())
        else {
            return Err(invalid());
        };

        let result = match (kind, action) {
            ("devices", "list") => json!({ "device": self.manager.list_devices() }),
            ("sensors", "list") => json!({ "sensor": self.manager.list_sensors() }),
            ("device", "info") => {
                let id = object_id(params).ok_or_else(invalid)?;
                self.manager.get_device(id).ok_or_else(invalid)?
            }
            ("sensor", "info") => {
                let id = object_id(params).ok_or_else(invalid)?;
                self.manager.get_sensor(id).ok_or_else(invalid)?
            }
            ("device", command) if COMMANDS.contains(&command) => {
                let id = object_id(params).ok_or_else(invalid)?;
                if self.manager.get_device(id).is_none() {
                    return Err(invalid());
                }
                if !self.manager.execute_command(id, command, params) {
                    return Err(Error::Api {
                        message: format!("device {id} refused {command}"),
                    });
                }
                json!({ "status": "success" })
            }
            _ => return Err(invalid()),
        };

        debug!(path, %result, "loopback reply");
        Ok(result)
    }
}

fn object_id(params: &Params) -> Option<&str> {
    params.get("id").map(String::as_str)
}
