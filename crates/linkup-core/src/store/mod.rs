// ── State store ──
//
// The flat key-value tree the sync writes into. Ids are dot-separated
// paths (`<patientId>.graph.graphData.01.Value`); every id can carry an
// object definition and, for leaves, a value.

mod flatten;
mod memory;
mod object;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

pub use flatten::{FlattenOptions, flatten_into, sanitize_key};
pub use memory::MemoryStore;
pub use object::{ObjectCommon, ObjectKind, ObjectSpec, StateType};

/// A value held at a state id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateValue {
    pub val: Value,
    /// `true` when written by the sync itself, `false` for commands.
    pub ack: bool,
    pub ts: DateTime<Utc>,
}

/// Published on every state write.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub id: String,
    pub value: Value,
    pub ack: bool,
}

/// Host-side storage for objects and states.
pub trait StateStore: Send + Sync {
    /// Create the object if it does not exist yet. Returns `true` if created.
    fn ensure_object(&self, id: &str, spec: ObjectSpec) -> bool;

    /// Create the object, or merge `spec` into the existing one.
    fn extend_object(&self, id: &str, spec: ObjectSpec);

    fn get_object(&self, id: &str) -> Option<ObjectSpec>;

    fn set_state(&self, id: &str, value: Value, ack: bool);

    fn get_state(&self, id: &str) -> Option<StateValue>;

    /// Feed of every subsequent `set_state`.
    fn subscribe(&self) -> broadcast::Receiver<StateChange>;
}
