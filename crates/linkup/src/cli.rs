//! Clap derive structures for the `linkup` CLI.
//!
//! Shared with `build.rs` for man page generation, so this module may only
//! depend on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// linkup -- LibreLinkUp glucose sync client
#[derive(Debug, Parser)]
#[command(
    name = "linkup",
    version,
    about = "Sync LibreLinkUp glucose data into a local state tree",
    long_about = "Logs into the LibreLinkUp follower API, discovers linked patients and\n\
        periodically pulls their graph data, flattening it into dot-separated states.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "LINKUP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Regional API host, e.g. eu, us, de (overrides config)
    #[arg(long, short = 'r', global = true)]
    pub region: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LINKUP_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Also write logs to this file, rotated daily
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll continuously until interrupted (Ctrl-C)
    Run(RunArgs),

    /// List linked patients
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Fetch graph data once and print the flattened states
    Graph(GraphArgs),

    /// Manage configuration and credentials
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Data refresh interval in minutes (overrides config, minimum 0.5)
    #[arg(long, short = 'i')]
    pub interval: Option<f64>,
}

#[derive(Debug, Args)]
pub struct GraphArgs {
    /// Patient id (defaults to every linked patient)
    pub patient_id: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup: account, region, password storage
    Init,

    /// Show the effective configuration (password redacted)
    Show,

    /// Store the password in the system keyring
    SetPassword {
        /// Account e-mail (defaults to the configured username)
        #[arg(long, short = 'u')]
        username: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
