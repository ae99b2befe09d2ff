//! `linkup graph`: one poll pass, printed as flattened states.

use serde::Serialize;
use tabled::Tabled;

use linkup_core::SyncConfig;

use crate::cli::{GraphArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StateEntry {
    id: String,
    value: serde_json::Value,
}

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "State")]
    id: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn handle(sync: &SyncConfig, args: GraphArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (synchronizer, store) = super::connect(sync).await?;

    let ids = match args.patient_id {
        Some(id) => {
            synchronizer.focus_device(&id).await?;
            vec![id]
        }
        None => {
            if synchronizer.get_device_list().await == 0 {
                return Err(CliError::NoDevices);
            }
            synchronizer.registry().snapshot().to_vec()
        }
    };

    let report = synchronizer.update_devices().await;
    if report.unauthorized {
        return Err(CliError::NotLoggedIn);
    }
    tracing::info!(devices = report.devices, updated = report.updated, "poll finished");

    let entries: Vec<StateEntry> = ids
        .iter()
        .flat_map(|id| store.states_under(&format!("{id}.graph")))
        .map(|(id, value)| StateEntry { id, value })
        .collect();

    let out = output::render_list(
        global.output,
        &entries,
        |e| StateRow {
            id: e.id.clone(),
            value: output::cell(&e.value),
        },
        |e| format!("{}={}", e.id, output::cell(&e.value)),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
