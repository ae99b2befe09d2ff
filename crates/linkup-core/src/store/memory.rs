// ── In-memory state store ──
//
// DashMap-backed objects and states with a broadcast feed of writes.
// Nothing is persisted; a fresh process starts from an empty tree.

use std::collections::BTreeMap;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{ObjectSpec, StateChange, StateStore, StateValue};

const CHANGE_CHANNEL_SIZE: usize = 4096;

pub struct MemoryStore {
    objects: DashMap<String, ObjectSpec>,
    states: DashMap<String, StateValue>,
    changes: broadcast::Sender<StateChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            objects: DashMap::new(),
            states: DashMap::new(),
            changes,
        }
    }

    /// All states at or below `prefix`, ordered by id.
    pub fn states_under(&self, prefix: &str) -> BTreeMap<String, Value> {
        let nested = format!("{prefix}.");
        self.states
            .iter()
            .filter(|entry| {
                prefix.is_empty() || entry.key() == prefix || entry.key().starts_with(&nested)
            })
            .map(|entry| (entry.key().clone(), entry.value().val.clone()))
            .collect()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl StateStore for MemoryStore {
    fn ensure_object(&self, id: &str, spec: ObjectSpec) -> bool {
        match self.objects.entry(id.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(spec);
                true
            }
        }
    }

    fn extend_object(&self, id: &str, spec: ObjectSpec) {
        match self.objects.get_mut(id) {
            Some(mut existing) => existing.merge(spec),
            None => {
                self.objects.insert(id.to_owned(), spec);
            }
        }
    }

    fn get_object(&self, id: &str) -> Option<ObjectSpec> {
        self.objects.get(id).map(|o| o.clone())
    }

    fn set_state(&self, id: &str, value: Value, ack: bool) {
        self.states.insert(
            id.to_owned(),
            StateValue {
                val: value.clone(),
                ack,
                ts: Utc::now(),
            },
        );
        // No subscribers is fine.
        let _ = self.changes.send(StateChange {
            id: id.to_owned(),
            value,
            ack,
        });
    }

    fn get_state(&self, id: &str) -> Option<StateValue> {
        self.states.get(id).map(|s| s.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::ObjectKind;
    use serde_json::json;

    #[test]
    fn ensure_object_does_not_overwrite() {
        let store = MemoryStore::new();
        assert!(store.ensure_object("p1", ObjectSpec::device("Ada L")));
        assert!(!store.ensure_object("p1", ObjectSpec::device("Someone Else")));
        assert_eq!(store.get_object("p1").unwrap().common.name, "Ada L");
    }

    #[test]
    fn extend_object_creates_then_updates() {
        let store = MemoryStore::new();
        store.extend_object("p1.general", ObjectSpec::channel("first"));
        store.extend_object("p1.general", ObjectSpec::channel("second"));
        let obj = store.get_object("p1.general").unwrap();
        assert_eq!(obj.kind, ObjectKind::Channel);
        assert_eq!(obj.common.name, "second");
    }

    #[test]
    fn states_under_matches_whole_segments() {
        let store = MemoryStore::new();
        store.set_state("p1.graph.a", json!(1), true);
        store.set_state("p1.graph.b", json!(2), true);
        store.set_state("p1.graphs.c", json!(3), true);

        let states = store.states_under("p1.graph");
        assert_eq!(states.keys().collect::<Vec<_>>(), ["p1.graph.a", "p1.graph.b"]);
    }

    #[tokio::test]
    async fn writes_are_broadcast() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set_state("p1.remote.Refresh", json!(true), false);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.id, "p1.remote.Refresh");
        assert_eq!(change.value, json!(true));
        assert!(!change.ack);
        assert!(!store.get_state("p1.remote.Refresh").unwrap().ack);
    }
}
