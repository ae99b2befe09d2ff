// ── Host adapter ──
//
// Binds the scheduler to a state store: mirrors the connectivity flag
// into `info.connection`, turns writes to `<id>.remote.Refresh` into
// immediate polls and shuts everything down on cancellation.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use linkup_api::Credentials;

use crate::config::{Schedule, SyncConfig};
use crate::error::CoreError;
use crate::registry::REFRESH_COMMAND;
use crate::scheduler::{PollScheduler, SchedulerState};
use crate::store::{ObjectSpec, StateChange, StateStore, StateType};
use crate::sync::Synchronizer;
use crate::upstream::LinkUpApi;

pub const CONNECTION_STATE_ID: &str = "info.connection";

#[derive(Clone)]
pub struct Adapter {
    scheduler: PollScheduler,
    store: Arc<dyn StateStore>,
}

impl Adapter {
    /// Build an adapter talking to the real API.
    pub fn new(config: &SyncConfig, store: Arc<dyn StateStore>) -> Result<Self, CoreError> {
        let client = config.build_client()?;
        Ok(Self::with_api(
            Arc::new(client),
            config.credentials.clone(),
            config.schedule,
            store,
        ))
    }

    pub fn with_api(
        api: Arc<dyn LinkUpApi>,
        credentials: Credentials,
        schedule: Schedule,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let sync = Synchronizer::new(api, credentials, Arc::clone(&store));
        Self {
            scheduler: PollScheduler::new(sync, schedule),
            store,
        }
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// React to a store write. Returns whether a poll was triggered.
    pub fn on_state_change(&self, change: &StateChange) -> bool {
        if change.ack {
            return false;
        }
        let Some(patient_id) = refresh_target(&change.id) else {
            return false;
        };
        info!(patient_id, "manual refresh requested");
        self.scheduler.trigger_refresh();
        true
    }

    /// Start the scheduler and serve commands until `shutdown` fires.
    ///
    /// Returns [`CoreError::NotAuthenticated`] when the initial login
    /// failed; the scheduler is shut down either way.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), CoreError> {
        self.store.ensure_object(
            CONNECTION_STATE_ID,
            ObjectSpec::state("Device or service connected", StateType::Boolean),
        );
        self.store.set_state(CONNECTION_STATE_ID, json!(false), true);

        // Subscribe before starting so no write is missed.
        let mut changes = self.store.subscribe();
        let mut connected = self.scheduler.session().subscribe_connected();

        if self.scheduler.start().await == SchedulerState::Stopped {
            self.scheduler.shutdown().await;
            return Err(CoreError::NotAuthenticated);
        }
        self.mirror_connected(*connected.borrow_and_update());

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(change) => {
                        self.on_state_change(&change);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "state change feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                Ok(()) = connected.changed() => {
                    self.mirror_connected(*connected.borrow_and_update());
                }
            }
        }

        self.scheduler.shutdown().await;
        self.mirror_connected(false);
        debug!("adapter stopped");
        Ok(())
    }

    fn mirror_connected(&self, connected: bool) {
        self.store
            .set_state(CONNECTION_STATE_ID, json!(connected), true);
    }
}

/// Patient id of a `<id>.remote.Refresh` state id.
pub fn refresh_target(id: &str) -> Option<&str> {
    let mut parts = id.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(patient_id), Some("remote"), Some(command), None)
            if !patient_id.is_empty() && command == REFRESH_COMMAND =>
        {
            Some(patient_id)
        }
        _ => None,
    }
}
