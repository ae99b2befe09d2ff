mod cli;
mod commands;
mod error;
mod output;

use std::path::Path;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use linkup_config::{Config, ConfigError};
use linkup_core::SyncConfig;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit.
    let guard = init_tracing(&cli.global);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        drop(guard);
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(global: &GlobalOpts) -> Option<WorkerGuard> {
    let level = if global.quiet {
        "error"
    } else {
        match global.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match global.log_file.as_deref().and_then(split_log_path) {
        Some((dir, file_name)) => {
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn split_log_path(path: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let file_name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Some((dir, file_name))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands work without credentials
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "linkup", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let sync = build_sync_config(&cli.global)?;
            tracing::debug!(command = ?cmd, region = %sync.region, "dispatching command");
            commands::dispatch(cmd, sync, &cli.global).await
        }
    }
}

/// Load the config file named by `--config` (or the default one).
pub(crate) fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match global.config {
        Some(ref path) => linkup_config::load_config_from(path)?,
        None => linkup_config::load_config()?,
    };
    if let Some(ref region) = global.region {
        cfg.region.clone_from(region);
    }
    Ok(cfg)
}

pub(crate) fn config_file(global: &GlobalOpts) -> std::path::PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(linkup_config::config_path)
}

/// Build a `SyncConfig` from the config file, environment and CLI overrides.
fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load_config(global)?;
    linkup_config::to_sync_config(&cfg).map_err(|e| match e {
        ConfigError::NoCredentials => CliError::NoCredentials {
            path: config_file(global).display().to_string(),
        },
        other => other.into(),
    })
}
