//! `linkup run`: the long-lived sync loop.
//!
//! Prints one line per patient whenever a poll delivers a current glucose
//! reading; everything else goes to the log.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use linkup_core::{Adapter, MemoryStore, Schedule, StateChange, StateStore, SyncConfig};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output;

const READING_SUFFIX: &str = ".graph.connection.glucoseMeasurement.ValueInMgPerDl";

pub async fn handle(
    mut sync: SyncConfig,
    args: &RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(minutes) = args.interval {
        sync.schedule = Schedule::with_poll_minutes(minutes);
    }

    let store = Arc::new(MemoryStore::new());
    let adapter = Adapter::new(&sync, store.clone())?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    let mut changes = store.subscribe();
    let format = global.output;
    let quiet = global.quiet;
    let printer = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if let Some(line) = reading_line(&change, format) {
                        output::print_output(&line, quiet);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "reading feed lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!(
        region = %sync.region,
        interval_secs = sync.schedule.poll_interval.as_secs(),
        "starting sync"
    );
    let result = adapter.run(shutdown).await;
    printer.abort();
    result?;
    Ok(())
}

/// Cancel `shutdown` once `signal` fires. A signal handler that cannot
/// be installed leaves the loop running until the process is killed.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
    }
}

/// Render an acknowledged glucose reading, ignoring every other write.
fn reading_line(change: &StateChange, format: OutputFormat) -> Option<String> {
    if !change.ack {
        return None;
    }
    let patient_id = change.id.strip_suffix(READING_SUFFIX)?;
    let value = &change.value;

    Some(match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            json!({ "patient_id": patient_id, "mg_dl": value }).to_string()
        }
        OutputFormat::Plain => format!("{patient_id}\t{}", plain(value)),
        OutputFormat::Table => format!(
            "{} {patient_id}: {} mg/dL",
            chrono::Local::now().format("%H:%M:%S"),
            plain(value)
        ),
    })
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn change(id: &str, value: Value, ack: bool) -> StateChange {
        StateChange {
            id: id.into(),
            value,
            ack,
        }
    }

    #[tokio::test]
    async fn signal_cancels_shutdown() {
        let shutdown = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn failed_signal_handler_keeps_running() {
        let shutdown = CancellationToken::new();
        let failed = async { Err(std::io::Error::other("no signal support")) };

        cancel_on_signal(failed, shutdown.clone()).await;

        assert!(!shutdown.is_cancelled());
    }

    #[test]
    fn readings_are_rendered_per_format() {
        let reading = change(
            "p-1.graph.connection.glucoseMeasurement.ValueInMgPerDl",
            json!(104),
            true,
        );

        let line = reading_line(&reading, OutputFormat::JsonCompact).unwrap();
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, json!({ "patient_id": "p-1", "mg_dl": 104 }));
        assert_eq!(
            reading_line(&reading, OutputFormat::Plain).unwrap(),
            "p-1\t104"
        );
        assert!(
            reading_line(&reading, OutputFormat::Table)
                .unwrap()
                .ends_with("p-1: 104 mg/dL")
        );
    }

    #[test]
    fn other_writes_are_skipped() {
        let unacked = change(
            "p-1.graph.connection.glucoseMeasurement.ValueInMgPerDl",
            json!(104),
            false,
        );
        let other = change("p-1.graph.graphData.01.Value", json!(98), true);

        assert!(reading_line(&unacked, OutputFormat::Plain).is_none());
        assert!(reading_line(&other, OutputFormat::Plain).is_none());
    }
}
