// Shared fixtures for the integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use tellstick_core::{DeviceManager, PacketCallback, Params};

type Intake = Arc<dyn Fn(Value) + Send + Sync>;

/// In-memory device manager. Packets pushed with [`FakeManager::push`]
/// reach the intake registered through `async_listen`.
#[derive(Default)]
pub struct FakeManager {
    pub devices: Vec<Value>,
    pub registered: Mutex<Vec<Value>>,
    intake: Mutex<Option<Intake>>,
}

impl FakeManager {
    pub fn with_lamp() -> Self {
        Self {
            devices: vec![json!({
                "id": "1",
                "name": "Lamp",
                "state": 1,
                "protocol": "arctech",
                "model": "selflearning-switch",
                "client": "local",
                "parameter": [{"name": "house", "value": "A"}, {"name": "unit", "value": "1"}]
            })],
            ..Self::default()
        }
    }

    /// Deliver a packet the way the radio thread would.
    pub fn push(&self, packet: Value) {
        let intake = self.intake.lock().unwrap().clone().unwrap();
        intake(packet);
    }
}

impl DeviceManager for FakeManager {
    fn list_devices(&self) -> Vec<Value> {
        self.devices.clone()
    }

    fn list_sensors(&self) -> Vec<Value> {
        Vec::new()
    }

    fn get_device(&self, id: &str) -> Option<Value> {
        self.devices.iter().find(|d| d["id"] == id).cloned()
    }

    fn get_sensor(&self, _id: &str) -> Option<Value> {
        None
    }

    fn execute_command(&self, _id: &str, _command: &str, _params: &Params) -> bool {
        true
    }

    fn add_device(&self, record: Value) {
        self.registered.lock().unwrap().push(record);
    }

    fn async_listen(&self, on_packet: PacketCallback) {
        *self.intake.lock().unwrap() = Some(Arc::from(on_packet));
    }
}
