//! # CLI Interface
//!
//! Defines the command-line argument structure for `trinity-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use trinity_protocol::config::{DEFAULT_RPC_PORT, DEFAULT_METRICS_PORT};

use crate::logging::LogFormat;

/// Trinity registry node.
///
/// Hosts a single Trinity ledger deployment: verifies signed calls,
/// executes them against the ledger, serves the JSON-RPC and REST API,
/// and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "trinity-node",
    about = "Trinity registry node",
    version,
    propagate_version = true
)]
pub struct TrinityNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Trinity node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the ledger and serve the API.
    Run(RunArgs),
    /// Initialize a data directory with an owner key and a genesis file.
    Init(InitArgs),
    /// Query the status of a running node via its API.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Log output format, as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory holding `owner.key` and `genesis.json`.
    #[arg(long, short = 'd', env = "TRINITY_DATA_DIR", default_value = ".trinity")]
    pub data_dir: PathBuf,

    /// Path to the genesis file.
    ///
    /// When omitted, the node reads `genesis.json` from the data directory.
    #[arg(long, short = 'g', env = "TRINITY_GENESIS")]
    pub genesis: Option<PathBuf>,

    /// Hex-encoded Ed25519 owner secret key.
    ///
    /// If not provided, the node reads `owner.key` from the data directory.
    /// **Never pass this flag in production**; use the key file instead.
    #[arg(long, env = "TRINITY_OWNER_KEY")]
    pub owner_key: Option<String>,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "TRINITY_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TRINITY_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, env = "TRINITY_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "TRINITY_DATA_DIR", default_value = ".trinity")]
    pub data_dir: PathBuf,

    /// Network to configure for: localhost, kovan or polygon.
    #[arg(long, default_value = "localhost")]
    pub network: String,

    /// Ether granted to the owner in the generated genesis file.
    #[arg(long, default_value = "100")]
    pub owner_balance: String,

    /// Overwrite an existing key and genesis file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running node.
    #[arg(long, env = "TRINITY_RPC_URL", default_value = "http://127.0.0.1:8545")]
    pub rpc_url: String,
}
