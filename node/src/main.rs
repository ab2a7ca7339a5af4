// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trinity Node
//!
//! Entry point for the `trinity-node` binary. Parses CLI arguments,
//! initializes logging and metrics, deploys the ledger from a genesis file,
//! and serves the HTTP/WS API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     — deploy the ledger and serve the API
//! - `init`    — create a data directory with an owner key and genesis
//! - `status`  — query a running node's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod genesis;
mod host;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, RwLock};

use trinity_protocol::amount::{format_ether, parse_ether};
use trinity_protocol::config::{network_name, NetworkConfig, PROTOCOL_VERSION};
use trinity_protocol::TrinityKeypair;

use cli::{Commands, TrinityNodeCli};
use genesis::Genesis;
use host::Host;
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

const OWNER_KEY_FILE: &str = "owner.key";
const GENESIS_FILE: &str = "genesis.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TrinityNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Deploys the ledger and serves the API and metrics endpoints until a
/// shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVES, LogFormat::from(args.log_format));

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting trinity-node"
    );

    // --- Genesis & owner ---
    let genesis_path = args
        .genesis
        .clone()
        .unwrap_or_else(|| args.data_dir.join(GENESIS_FILE));
    let genesis = Genesis::load(&genesis_path).with_context(|| {
        format!(
            "failed to load genesis from {} (run `trinity-node init` first?)",
            genesis_path.display()
        )
    })?;

    let owner = load_owner_key(args.owner_key.as_deref(), &args.data_dir)?;
    let host = Host::from_genesis(&genesis, owner.address())
        .with_context(|| format!("invalid genesis file {}", genesis_path.display()))?;
    let network = network_name(genesis.chain_id);

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.observe_ledger(host.ledger());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION
        ),
        network: network.clone(),
        host: Arc::new(RwLock::new(host)),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!(%network, "RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "API server error");
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "metrics server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("trinity-node stopped");
    Ok(())
}

/// Reads the owner key from `--owner-key` or `<data_dir>/owner.key`.
fn load_owner_key(flag: Option<&str>, data_dir: &Path) -> Result<TrinityKeypair> {
    let hex_key = match flag {
        Some(k) => k.to_string(),
        None => {
            let path = data_dir.join(OWNER_KEY_FILE);
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read owner key from {}", path.display()))?
        }
    };
    TrinityKeypair::from_hex(hex_key.trim()).context("owner key is not a valid Ed25519 secret key")
}

/// What `init` wrote.
#[derive(Debug)]
struct InitReport {
    key_path: PathBuf,
    genesis_path: PathBuf,
    owner: TrinityKeypair,
    network: &'static NetworkConfig,
}

/// Creates the data directory, an owner key and a genesis file funding it.
fn initialize_data_dir(
    data_dir: &Path,
    network: &str,
    owner_balance: &str,
    force: bool,
) -> Result<InitReport> {
    let network = NetworkConfig::by_name(network)
        .with_context(|| format!("unknown network {:?}", network))?;
    let balance = parse_ether(owner_balance)
        .with_context(|| format!("invalid owner balance {:?}", owner_balance))?;

    let key_path = data_dir.join(OWNER_KEY_FILE);
    let genesis_path = data_dir.join(GENESIS_FILE);
    if !force && (key_path.exists() || genesis_path.exists()) {
        bail!(
            "{} is already initialized (pass --force to overwrite)",
            data_dir.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let owner = TrinityKeypair::generate();
    write_owner_key(&key_path, &owner)
        .with_context(|| format!("failed to write owner key to {}", key_path.display()))?;

    Genesis::for_network(network, owner.address(), balance)
        .save(&genesis_path)
        .with_context(|| format!("failed to write genesis to {}", genesis_path.display()))?;

    Ok(InitReport {
        key_path,
        genesis_path,
        owner,
        network,
    })
}

/// Writes the secret key to a fresh file that is owner-only from creation.
///
/// Any previous key is removed first so a `--force` overwrite never reuses
/// a file with looser permissions.
fn write_owner_key(path: &Path, owner: &TrinityKeypair) -> std::io::Result<()> {
    use std::io::Write;

    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(owner.secret_key_hex().as_bytes())?;
    file.sync_all()
}

/// `init` subcommand.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("trinity_node=info", LogFormat::Pretty);
    tracing::info!(data_dir = %args.data_dir.display(), network = %args.network, "initializing node");

    let report = initialize_data_dir(&args.data_dir, &args.network, &args.owner_balance, args.force)?;

    tracing::info!(
        owner = %report.owner.address(),
        key_path = %report.key_path.display(),
        "owner keypair generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Network        : {} ({})", report.network.name, report.network.chain_id);
    println!("  Entrance fee   : {} ETH", format_ether(report.network.entrance_fee));
    println!("  Owner key      : {}", report.key_path.display());
    println!("  Owner address  : {}", report.owner.address());
    println!("  Genesis        : {}", report.genesis_path.display());

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {}", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error", url))?
        .text()
        .await?;
    println!("{}", body);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("trinity-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
