// ── Device registry ──
//
// Ordered patient ids known from the last non-empty device list. Replaced
// only by a device-list refresh; read by every data poll.

use std::sync::Arc;

use arc_swap::ArcSwap;
use linkup_api::Connection;
use tracing::warn;

use crate::store::{FlattenOptions, ObjectSpec, StateStore, flatten_into};

pub const REMOTE_CHANNEL_NAME: &str = "Remote Controls";
pub const GENERAL_CHANNEL_NAME: &str = "General Information. Update only once a day";
pub const REFRESH_COMMAND: &str = "Refresh";
pub const REFRESH_BUTTON_NAME: &str = "True = Refresh";

#[derive(Default)]
pub struct DeviceRegistry {
    ids: ArcSwap<Vec<String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, ids: Vec<String>) {
        self.ids.store(Arc::new(ids));
    }

    pub fn snapshot(&self) -> Arc<Vec<String>> {
        self.ids.load_full()
    }

    pub fn len(&self) -> usize {
        self.ids.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.load().is_empty()
    }

    pub fn contains(&self, patient_id: &str) -> bool {
        self.ids.load().iter().any(|id| id == patient_id)
    }
}

/// Create the object tree for one device and write its descriptor
/// under `<id>.general`.
pub(crate) fn provision(store: &dyn StateStore, device: &Connection) {
    let id = device.patient_id.as_str();

    store.ensure_object(id, ObjectSpec::device(device.display_name()));
    store.ensure_object(
        &format!("{id}.remote"),
        ObjectSpec::channel(REMOTE_CHANNEL_NAME),
    );
    store.extend_object(
        &format!("{id}.general"),
        ObjectSpec::channel(GENERAL_CHANNEL_NAME),
    );
    store.ensure_object(
        &format!("{id}.remote.{REFRESH_COMMAND}"),
        ObjectSpec::button(REFRESH_BUTTON_NAME),
    );

    match serde_json::to_value(device) {
        Ok(descriptor) => {
            flatten_into(
                store,
                &format!("{id}.general"),
                &descriptor,
                &FlattenOptions::default(),
            );
        }
        Err(e) => warn!(patient_id = id, error = %e, "device descriptor not serializable"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectKind};
    use crate::testing::connection;
    use serde_json::json;

    #[test]
    fn replace_keeps_response_order() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());

        registry.replace(vec!["b".into(), "a".into()]);

        assert_eq!(*registry.snapshot(), ["b", "a"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));
    }

    #[test]
    fn provision_builds_device_tree() {
        let store = MemoryStore::new();
        provision(&store, &connection("p1", "Ada", "Lovelace"));

        let device = store.get_object("p1").unwrap();
        assert_eq!(device.kind, ObjectKind::Device);
        assert_eq!(device.common.name, "Ada Lovelace");
        assert_eq!(store.get_object("p1.remote").unwrap().common.name, REMOTE_CHANNEL_NAME);
        assert_eq!(
            store.get_object("p1.general").unwrap().common.name,
            GENERAL_CHANNEL_NAME
        );

        let button = store.get_object("p1.remote.Refresh").unwrap();
        assert!(button.common.write);
        assert_eq!(button.common.name, REFRESH_BUTTON_NAME);

        assert_eq!(store.get_state("p1.general.firstName").unwrap().val, json!("Ada"));
        assert_eq!(store.get_state("p1.general.sensor.sn").unwrap().val, json!("0ABC"));
    }

    #[test]
    fn provision_keeps_existing_device_name() {
        let store = MemoryStore::new();
        provision(&store, &connection("p1", "Ada", "Lovelace"));
        provision(&store, &connection("p1", "Ada", "Byron"));

        assert_eq!(store.get_object("p1").unwrap().common.name, "Ada Lovelace");
        assert_eq!(store.get_state("p1.general.lastName").unwrap().val, json!("Byron"));
    }
}
