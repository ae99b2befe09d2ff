// ── Synchronizer ──
//
// The two data operations the scheduler drives: refreshing the device
// list and polling graph data for every registered device. Both log their
// failures and never propagate them; a 401 on a poll is reported back so
// the caller can arrange a re-login. The one-shot lookups the CLI uses
// (`linked_devices`, `focus_device`) return their errors instead.

use std::sync::Arc;

use linkup_api::{Connection, Credentials};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::CoreError;
use crate::registry::{DeviceRegistry, provision};
use crate::session::SessionManager;
use crate::store::{FlattenOptions, StateStore, flatten_into};
use crate::upstream::LinkUpApi;

pub const GRAPH_CHANNEL_NAME: &str = "Graph data of the device";

/// Outcome of one `update_devices` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Registered devices at the start of the pass.
    pub devices: usize,
    /// Devices whose graph was written to the store.
    pub updated: usize,
    /// At least one request was answered with 401.
    pub unauthorized: bool,
}

#[derive(Clone)]
pub struct Synchronizer {
    api: Arc<dyn LinkUpApi>,
    session: Arc<SessionManager>,
    registry: Arc<DeviceRegistry>,
    store: Arc<dyn StateStore>,
}

impl Synchronizer {
    pub fn new(
        api: Arc<dyn LinkUpApi>,
        credentials: Credentials,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(Arc::clone(&api), credentials));
        Self {
            api,
            session,
            registry: Arc::new(DeviceRegistry::new()),
            store,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    // ── Device list ──────────────────────────────────────────────────

    /// Fetch linked patients without touching the registry or store.
    pub async fn fetch_devices(&self) -> Result<Vec<Connection>, CoreError> {
        let ctx = self.session.context().ok_or(CoreError::NotAuthenticated)?;
        Ok(self.api.connections(&ctx).await?)
    }

    /// Refresh the registry from the device list and provision each
    /// device in the store. Returns the number of devices registered.
    ///
    /// An empty list or a failed request leaves the registry as it was.
    pub async fn get_device_list(&self) -> usize {
        let devices = match self.fetch_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                error!(error = %e, "device list refresh failed");
                return 0;
            }
        };

        if devices.is_empty() {
            error!("No linked patients found. Please connect your FreeStyle Libre app with LibreLinkUp");
            return 0;
        }

        self.registry
            .replace(devices.iter().map(|d| d.patient_id.clone()).collect());
        for device in &devices {
            provision(self.store.as_ref(), device);
        }
        info!(count = devices.len(), "device list refreshed");
        devices.len()
    }

    /// Linked patients; an empty list is [`CoreError::NoDevices`].
    pub async fn linked_devices(&self) -> Result<Vec<Connection>, CoreError> {
        let devices = self.fetch_devices().await?;
        if devices.is_empty() {
            return Err(CoreError::NoDevices);
        }
        Ok(devices)
    }

    /// Narrow the registry to one patient and provision it, so the next
    /// `update_devices` polls only that patient.
    pub async fn focus_device(&self, patient_id: &str) -> Result<(), CoreError> {
        let devices = self.linked_devices().await?;
        let device = devices
            .iter()
            .find(|d| d.patient_id == patient_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                patient_id: patient_id.to_owned(),
            })?;

        provision(self.store.as_ref(), device);
        self.registry.replace(vec![device.patient_id.clone()]);
        Ok(())
    }

    // ── Data poll ────────────────────────────────────────────────────

    /// Fetch graph data for every registered device and flatten it under
    /// `<id>.graph`.
    pub async fn update_devices(&self) -> PollReport {
        let ids = self.registry.snapshot();
        let mut report = PollReport {
            devices: ids.len(),
            ..PollReport::default()
        };
        if ids.is_empty() {
            return report;
        }

        let Some(ctx) = self.session.context() else {
            debug!("no session, data refresh needs a login first");
            report.unauthorized = true;
            return report;
        };

        let options = FlattenOptions {
            force_index: true,
            preferred_array_name: None,
            channel_name: Some(GRAPH_CHANNEL_NAME.to_owned()),
        };

        for id in &*ids {
            match self.api.graph(&ctx, id).await {
                Ok(doc) => match prepare_graph(doc) {
                    Some(data) => {
                        let prefix = format!("{id}.graph");
                        let written = flatten_into(self.store.as_ref(), &prefix, &data, &options);
                        info!(
                            patient_id = %id,
                            glucose = ?latest_glucose(&data),
                            states = written,
                            "graph updated"
                        );
                        report.updated += 1;
                    }
                    None => debug!(patient_id = %id, "empty graph response"),
                },
                Err(e) if e.is_unauthorized() => {
                    debug!(patient_id = %id, body = ?e.response_body(), "graph request unauthorized");
                    report.unauthorized = true;
                }
                Err(e) => {
                    error!(
                        url = %self.api.graph_location(id),
                        error = %e,
                        body = ?e.response_body(),
                        "graph refresh failed"
                    );
                }
            }
        }

        report
    }
}

/// Unwrap the response envelope and put `graphData` oldest-first.
///
/// Returns `None` for an empty body.
pub fn prepare_graph(doc: Value) -> Option<Value> {
    if !is_truthy(&doc) {
        return None;
    }

    let mut data = match doc {
        Value::Object(mut map) => match map.remove("data") {
            Some(inner) if is_truthy(&inner) => inner,
            Some(inner) => {
                map.insert("data".to_owned(), inner);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    };

    if let Some(Value::Array(points)) = data.get_mut("graphData") {
        points.reverse();
    }
    Some(data)
}

/// Current reading in mg/dL carried next to the graph.
pub fn latest_glucose(data: &Value) -> Option<&Value> {
    data.pointer("/connection/glucoseMeasurement/ValueInMgPerDl")
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
