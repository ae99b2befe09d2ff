//! `linkup devices`: list linked patients.

use serde::Serialize;
use tabled::Tabled;

use linkup_api::Connection;
use linkup_core::SyncConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct DeviceEntry {
    patient_id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_glucose: Option<serde_json::Value>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Patient ID")]
    patient_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Last mg/dL")]
    last_glucose: String,
}

impl From<&Connection> for DeviceEntry {
    fn from(c: &Connection) -> Self {
        Self {
            patient_id: c.patient_id.clone(),
            name: c.display_name(),
            last_glucose: c
                .extra
                .get("glucoseMeasurement")
                .and_then(|m| m.get("ValueInMgPerDl"))
                .cloned(),
        }
    }
}

pub async fn handle(sync: &SyncConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let (synchronizer, _store) = super::connect(sync).await?;
    let devices = synchronizer.linked_devices().await?;

    let entries: Vec<DeviceEntry> = devices.iter().map(DeviceEntry::from).collect();
    let out = output::render_list(
        global.output,
        &entries,
        |e| DeviceRow {
            patient_id: e.patient_id.clone(),
            name: e.name.clone(),
            last_glucose: e.last_glucose.as_ref().map(output::cell).unwrap_or_default(),
        },
        |e| e.patient_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
