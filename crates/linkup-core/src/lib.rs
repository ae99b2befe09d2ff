// linkup-core: Session, device registry and poll scheduling between linkup-api and a state store.

pub mod adapter;
pub mod config;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod sync;
pub mod upstream;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{Adapter, CONNECTION_STATE_ID, refresh_target};
pub use config::{Schedule, SyncConfig, clamp_poll_interval};
pub use error::CoreError;
pub use registry::DeviceRegistry;
pub use scheduler::{PollScheduler, SchedulerState};
pub use session::{Session, SessionManager};
pub use store::{
    FlattenOptions, MemoryStore, ObjectKind, ObjectSpec, StateChange, StateStore, StateValue,
    flatten_into,
};
pub use sync::{PollReport, Synchronizer, latest_glucose, prepare_graph};
pub use upstream::LinkUpApi;
