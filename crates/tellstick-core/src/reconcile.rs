// ── Async reconciler ──
//
// Packets pushed by the device manager carry no store key, only the
// radio-level identity of the sender: (protocol, model, sensorId) for
// sensors, (house, unit) for devices. Each packet is matched against the
// cached entries by that composite key. On first sight a placeholder
// built from the packet itself is inserted and the scan is repeated, so
// later packets with the same key land on the same entry.
//
// Runs on the device manager's thread. Match, placeholder insert and
// merge all happen under one store lock; the listener is only called
// after the lock is released.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{Span, debug, info, warn};

use tellstick_api::PacketCallback;

use crate::dispatch::{CallbackDispatcher, Listener};
use crate::model::{DeviceKey, Entry, Field, Identifier, SensorKey};
use crate::store::{StateStore, StoreState};

/// A reconciled packet, as handed to the listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub id: Identifier,
    /// The entry after the merge, not the raw packet.
    pub entry: Entry,
    /// Whether a placeholder entry was created for this packet.
    pub created: bool,
}

/// Why a packet was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Anomaly {
    #[error("packet is not a JSON object")]
    NotAnObject,

    #[error("sensor packet lacks protocol, model or sensorId")]
    MissingSensorKey,

    #[error("sensor packet carries no data")]
    MissingData,

    #[error("device packet lacks house or unit parameters")]
    MissingDeviceKey,

    #[error("device packet carries sensor data")]
    AmbiguousKind,

    #[error("unmatched packet has no id to key a placeholder")]
    MissingId,

    #[error("placeholder {id} is not reachable by its own key")]
    Unreachable { id: Identifier },
}

pub struct Reconciler {
    store: Arc<StateStore>,
    span: Span,
}

impl Reconciler {
    pub fn new(store: Arc<StateStore>, span: Span) -> Self {
        Self { store, span }
    }

    /// Resolve one packet against the store and merge it in.
    pub fn reconcile(&self, packet: Value) -> Result<Update, Anomaly> {
        let _entered = self.span.enter();
        let packet = Entry::from_value(packet).ok_or(Anomaly::NotAnObject)?;
        if packet.contains(Field::SensorId) {
            self.reconcile_sensor(packet)
        } else {
            self.reconcile_device(packet)
        }
    }

    fn reconcile_sensor(&self, packet: Entry) -> Result<Update, Anomaly> {
        let key = packet.sensor_key().ok_or(Anomaly::MissingSensorKey)?;
        let data = packet.get(Field::Data).cloned().ok_or(Anomaly::MissingData)?;
        debug!(
            protocol = %key.protocol,
            model = %key.model,
            sensor_id = %key.sensor_id,
            %data,
            "received asynchronous sensor packet"
        );

        let mut state = self.store.lock();
        let (id, created) = match find_sensor(&state, &key) {
            Some(id) => (id, false),
            None => {
                // Packets straight off the radio may lack a hub id.
                let raw = packet.id().unwrap_or_else(|| key.sensor_id.clone());
                let placeholder = Identifier::sensor(raw);
                info!(
                    id = %placeholder,
                    protocol = %key.protocol,
                    model = %key.model,
                    sensor_id = %key.sensor_id,
                    "no cached sensor for packet, adding placeholder"
                );
                insert_placeholder(&mut state, &placeholder, packet)?;
                let id = find_sensor(&state, &key).ok_or(Anomaly::Unreachable { id: placeholder })?;
                (id, true)
            }
        };

        merge(&mut state, id, created, Field::Data, data)
    }

    fn reconcile_device(&self, packet: Entry) -> Result<Update, Anomaly> {
        let key = packet.device_key().ok_or(Anomaly::MissingDeviceKey)?;
        if packet.is_sensor() {
            return Err(Anomaly::AmbiguousKind);
        }
        let reading = packet.get(Field::State).cloned();
        debug!(house = %key.house, unit = %key.unit, ?reading, "received asynchronous device packet");

        let mut state = self.store.lock();
        let (id, created) = match find_device(&state, &key) {
            Some(id) => (id, false),
            None => {
                let placeholder = Identifier::device(packet.id().ok_or(Anomaly::MissingId)?);
                info!(
                    id = %placeholder,
                    house = %key.house,
                    unit = %key.unit,
                    "no cached device for packet, adding placeholder"
                );
                insert_placeholder(&mut state, &placeholder, packet)?;
                let id = find_device(&state, &key).ok_or(Anomaly::Unreachable { id: placeholder })?;
                (id, true)
            }
        };

        match reading {
            Some(reading) => merge(&mut state, id, created, Field::State, reading),
            None => {
                let entry = state
                    .entries
                    .get(&id)
                    .cloned()
                    .ok_or(Anomaly::Unreachable { id: id.clone() })?;
                Ok(Update { id, entry, created })
            }
        }
    }

    /// Intake function for [`DeviceManager::async_listen`](tellstick_api::DeviceManager::async_listen).
    ///
    /// Anomalies are logged and the packet dropped; the delivery thread
    /// never sees a panic from here.
    pub fn into_callback(
        self,
        dispatcher: Arc<dyn CallbackDispatcher>,
        listener: Listener,
    ) -> PacketCallback {
        Box::new(move |packet| match self.reconcile(packet) {
            Ok(update) => {
                self.span
                    .in_scope(|| debug!(id = %update.id, created = update.created, "dispatching update"));
                dispatcher.dispatch(&listener, update);
            }
            Err(e) => self
                .span
                .in_scope(|| warn!(error = %e, "dropping asynchronous packet")),
        })
    }
}

// ── Matching ─────────────────────────────────────────────────────────

fn find_sensor(state: &StoreState, key: &SensorKey) -> Option<Identifier> {
    state
        .entries
        .iter()
        .find(|(_, e)| e.is_sensor() && e.sensor_key().as_ref() == Some(key))
        .map(|(id, _)| id.clone())
}

fn find_device(state: &StoreState, key: &DeviceKey) -> Option<Identifier> {
    state
        .entries
        .iter()
        .find(|(_, e)| !e.is_sensor() && e.device_key().as_ref() == Some(key))
        .map(|(id, _)| id.clone())
}

fn insert_placeholder(
    state: &mut StoreState,
    id: &Identifier,
    packet: Entry,
) -> Result<(), Anomaly> {
    if state.entries.contains_key(id) {
        warn!(%id, "placeholder replaces an entry whose key did not match");
    }
    if state.replace(id.clone(), packet) {
        Ok(())
    } else {
        Err(Anomaly::Unreachable { id: id.clone() })
    }
}

fn merge(
    state: &mut StoreState,
    id: Identifier,
    created: bool,
    field: Field,
    value: Value,
) -> Result<Update, Anomaly> {
    let Some(entry) = state.entries.get_mut(&id) else {
        return Err(Anomaly::Unreachable { id });
    };
    entry.set(field, value);
    Ok(Update {
        entry: entry.clone(),
        id,
        created,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn reconciler() -> Reconciler {
        Reconciler::new(Arc::new(StateStore::new()), Span::none())
    }

    fn sensor_packet(value: &str) -> Value {
        json!({
            "id": 7,
            "sensorId": 7,
            "protocol": "p",
            "model": "m",
            "data": [{"name": "temp", "value": value, "scale": "0"}]
        })
    }

    fn device_packet(id: u32, state: u32) -> Value {
        json!({
            "id": id,
            "state": state,
            "parameters": [{"name": "house", "value": "A"}, {"name": "unit", "value": "1"}]
        })
    }

    #[test]
    fn unseen_sensor_gets_one_placeholder() {
        let r = reconciler();
        let first = r.reconcile(sensor_packet("21")).unwrap();
        assert!(first.created);
        assert_eq!(first.id, Identifier::from("_7"));

        let second = r.reconcile(sensor_packet("22")).unwrap();
        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(r.store.len(), 1);
        assert_eq!(second.entry.get(Field::Data).unwrap()[0]["value"], "22");
    }

    #[test]
    fn sensor_packet_matches_cached_sensor_by_composite_key() {
        let r = reconciler();
        r.store.upsert(
            "_135",
            Entry::from_value(json!({
                "id": "135", "name": "Outdoor", "protocol": "p", "model": "m",
                "sensorId": "7", "data": []
            }))
            .unwrap(),
        );

        let update = r.reconcile(sensor_packet("3")).unwrap();
        assert!(!update.created);
        assert_eq!(update.id, Identifier::from("_135"));
        assert_eq!(update.entry.name(), Some("Outdoor"));
        assert_eq!(r.store.len(), 1);
    }

    #[test]
    fn sensor_without_hub_id_is_keyed_by_sensor_id() {
        let r = reconciler();
        let update = r
            .reconcile(json!({"sensorId": 9, "protocol": "p", "model": "m", "data": []}))
            .unwrap();
        assert_eq!(update.id, Identifier::from("_9"));
    }

    #[test]
    fn device_packet_merges_state_only() {
        let r = reconciler();
        r.store.upsert(
            "3",
            Entry::from_value(json!({
                "id": "3", "name": "Lamp", "state": 2,
                "parameters": [{"name": "unit", "value": 1}, {"name": "house", "value": "A"}]
            }))
            .unwrap(),
        );

        let update = r.reconcile(device_packet(99, 1)).unwrap();
        assert_eq!(update.id, Identifier::from("3"));
        assert_eq!(update.entry.int(Field::State), Some(1));
        assert_eq!(update.entry.name(), Some("Lamp"));
        assert!(!r.store.contains("99"));
    }

    #[test]
    fn unseen_device_gets_placeholder_under_raw_id() {
        let r = reconciler();
        let update = r.reconcile(device_packet(12, 1)).unwrap();
        assert!(update.created);
        assert_eq!(update.id, Identifier::from("12"));
        assert!(!r.reconcile(device_packet(12, 2)).unwrap().created);
        assert_eq!(r.store.len(), 1);
    }

    #[test]
    fn anomalies_leave_the_store_untouched() {
        let r = reconciler();
        assert_eq!(r.reconcile(json!([1])), Err(Anomaly::NotAnObject));
        assert_eq!(
            r.reconcile(json!({"sensorId": 1, "protocol": "p", "model": "m"})),
            Err(Anomaly::MissingData)
        );
        assert_eq!(
            r.reconcile(json!({"sensorId": 1, "data": []})),
            Err(Anomaly::MissingSensorKey)
        );
        assert_eq!(
            r.reconcile(json!({"id": 1, "parameters": []})),
            Err(Anomaly::MissingDeviceKey)
        );
        assert_eq!(
            r.reconcile(json!({
                "parameters": [{"name": "house", "value": "B"}, {"name": "unit", "value": "2"}]
            })),
            Err(Anomaly::MissingId)
        );
        let mut with_data = device_packet(4, 1);
        with_data["data"] = json!([]);
        assert_eq!(r.reconcile(with_data), Err(Anomaly::AmbiguousKind));
        assert!(r.store.is_empty());
    }

    #[test]
    fn device_placeholder_never_overwrites_a_sensor() {
        let r = reconciler();
        let sensor = Entry::from_value(json!({
            "id": "5", "name": "Greenhouse", "protocol": "p", "model": "m",
            "sensorId": "5", "data": [{"name": "temp", "value": "18"}]
        }))
        .unwrap();
        r.store.upsert("5", sensor.clone());

        assert_eq!(
            r.reconcile(device_packet(5, 1)),
            Err(Anomaly::Unreachable {
                id: Identifier::from("5")
            })
        );
        assert_eq!(r.store.len(), 1);
        assert_eq!(r.store.get("5"), Some(sensor));
    }
}
