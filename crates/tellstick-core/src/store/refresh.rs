// ── Full refresh application logic ──
//
// Merges polled device and sensor lists into the store. Devices are
// enriched (protocol, model, parameters, client id) before merging,
// either from the cached record or from a `device/info` reply. The merge
// is replace-or-insert per key; nothing is ever removed.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::StateStore;
use crate::model::{Entry, Field, Identifier};

/// Fields copied from a cached device into its fresh list record.
const ENRICHED_FIELDS: [Field; 4] = [
    Field::Parameters,
    Field::Protocol,
    Field::Model,
    Field::ClientId,
];

/// Copy the enrichment fields of a previously cached device.
pub(crate) fn enrich_from_cache(record: &mut Entry, cached: &Entry) {
    for field in ENRICHED_FIELDS {
        let value = cached.get(field).cloned().unwrap_or(Value::Null);
        record.set(field, value);
    }
}

/// Copy the enrichment fields out of a `device/info` reply, which names
/// two of them differently (`parameter`, `client`).
pub(crate) fn enrich_from_info(record: &mut Entry, info: &Value) {
    let pick = |name: &str| info.get(name).cloned().unwrap_or(Value::Null);
    record.set(Field::Parameters, pick("parameter"));
    record.set(Field::Protocol, pick("protocol"));
    record.set(Field::Model, pick("model"));
    record.set(Field::ClientId, pick("client"));
}

impl StateStore {
    /// Cached device record, if `id` names a known device (not a sensor).
    pub(crate) fn cached_device(&self, id: &Identifier) -> Option<Entry> {
        self.get(id.as_str()).filter(|e| !e.is_sensor())
    }

    /// Merge one polled snapshot under a single lock.
    ///
    /// Named devices first, then sensors that carry readings. Returns the
    /// number of entries written.
    pub(crate) fn apply_snapshot(&self, devices: Vec<Entry>, sensors: Vec<Entry>) -> usize {
        let mut state = self.lock();
        let mut written = 0;

        for device in devices {
            if device.name().is_none_or(str::is_empty) {
                debug!(id = ?device.id(), "skipping unnamed device");
                continue;
            }
            let Some(id) = device.id() else {
                debug!("skipping device without id");
                continue;
            };
            if state.replace(Identifier::device(id), device) {
                written += 1;
            }
        }

        for sensor in sensors {
            if !sensor.has_data() {
                debug!(id = ?sensor.id(), "skipping sensor without readings");
                continue;
            }
            let Some(id) = sensor.id() else {
                debug!("skipping sensor without id");
                continue;
            };
            if state.replace(Identifier::sensor(id), sensor) {
                written += 1;
            }
        }

        state.last_update = Some(Utc::now());
        written
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(value: Value) -> Entry {
        Entry::from_value(value).unwrap()
    }

    #[test]
    fn merge_filters_and_prefixes() {
        let store = StateStore::new();
        let written = store.apply_snapshot(
            vec![
                entry(json!({"id": 1, "name": "Lamp"})),
                entry(json!({"id": 2, "name": ""})),
                entry(json!({"id": 3})),
            ],
            vec![
                entry(json!({"id": 1, "name": "Outdoor", "data": [{"name": "temp", "value": "4"}]})),
                entry(json!({"id": 4, "name": "Empty", "data": []})),
                entry(json!({"id": 5, "name": "Nothing"})),
            ],
        );

        assert_eq!(written, 2);
        assert_eq!(
            store.ids(),
            vec![Identifier::from("1"), Identifier::from("_1")]
        );
        assert!(store.last_update().is_some());
    }

    #[test]
    fn merge_never_removes() {
        let store = StateStore::new();
        store.apply_snapshot(vec![entry(json!({"id": 1, "name": "Lamp"}))], Vec::new());
        store.apply_snapshot(vec![entry(json!({"id": 2, "name": "Fan"}))], Vec::new());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn enrichment_renames_info_fields() {
        let mut record = entry(json!({"id": 1, "name": "Lamp"}));
        enrich_from_info(
            &mut record,
            &json!({
                "parameter": [{"name": "house", "value": "A"}],
                "protocol": "arctech",
                "model": "selflearning-switch",
                "client": "42"
            }),
        );
        assert_eq!(record.text(Field::Protocol).as_deref(), Some("arctech"));
        assert_eq!(record.text(Field::ClientId).as_deref(), Some("42"));
        assert!(record.get(Field::Parameters).unwrap().is_array());
    }

    #[test]
    fn enrichment_from_cache_copies_known_fields() {
        let cached = entry(json!({"protocol": "arctech", "model": "m", "client_id": "7"}));
        let mut record = entry(json!({"id": 1, "name": "Lamp", "state": 2}));
        enrich_from_cache(&mut record, &cached);
        assert_eq!(record.text(Field::Model).as_deref(), Some("m"));
        assert_eq!(record.get(Field::Parameters), Some(&Value::Null));
        assert_eq!(record.int(Field::State), Some(2));
    }
}
