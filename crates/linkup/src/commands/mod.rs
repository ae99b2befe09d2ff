//! Command dispatch: bridges CLI args -> core sync operations -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod graph;
pub mod run;

use std::sync::Arc;

use linkup_core::{MemoryStore, SyncConfig, Synchronizer};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, sync: SyncConfig, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(sync, &args, global).await,
        Command::Devices => devices::handle(&sync, global).await,
        Command::Graph(args) => graph::handle(&sync, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}

/// Log in once and hand back a synchronizer over a fresh in-memory store.
pub(crate) async fn connect(
    sync: &SyncConfig,
) -> Result<(Synchronizer, Arc<MemoryStore>), CliError> {
    let client = sync.build_client()?;
    let store = Arc::new(MemoryStore::new());
    let synchronizer = Synchronizer::new(Arc::new(client), sync.credentials.clone(), store.clone());
    synchronizer.session().try_login().await?;
    Ok((synchronizer, store))
}
