// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ETHX Devnet Node
//!
//! Entry point for the `ethx-node` binary. Parses CLI arguments, initializes
//! logging and metrics, restores or deploys the exchange, and serves the
//! HTTP / JSON-RPC API.
//!
//! The binary supports four subcommands:
//!
//! - `run`    - start the node
//! - `init`   - write a config file into the data directory
//! - `status` - query a running node's status endpoint
//! - `version`- print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;

use ethx_protocol::config::{NodeConfig, NATIVE_SYMBOL, PROTOCOL_VERSION};
use ethx_protocol::storage::ExchangeDB;

use cli::{Commands, EthxNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = EthxNodeCli::parse();

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

/// Starts the node: restores or deploys the exchange, then serves the API
/// and the metrics endpoint until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format)
        .context("failed to initialize logging")?;

    // --- Configuration ---
    let config_path = args.config_path();
    let mut config = if config_path.exists() {
        NodeConfig::from_file(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "config file not found, using devnet defaults"
        );
        NodeConfig::devnet()
    };
    if let Some(port) = args.rpc_port {
        config.rpc_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }

    tracing::info!(
        network = %config.network,
        rpc_port = config.rpc_port,
        metrics_port = config.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting ethx-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = ExchangeDB::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Exchange ---
    let host = api::initialize_exchange(&db, &config)?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.observe(&host);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        network: config.network.clone(),
        host: Arc::new(RwLock::new(host)),
        db: Arc::new(db),
        metrics: Arc::clone(&node_metrics),
    };
    let db_ref = Arc::clone(&app_state.db);

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", config.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    db_ref.flush().context("failed to flush database")?;
    tracing::info!("ethx-node stopped");
    Ok(())
}

/// Writes a config file with devnet defaults and any CLI overrides.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(logging::COMMAND_FILTER, LogFormat::Pretty)
        .context("failed to initialize logging")?;

    let data_dir = &args.data_dir;
    let config_path = data_dir.join(cli::CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            config_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let mut config = NodeConfig::devnet();
    config.network = args.network;
    if let Some(rate) = args.rate {
        config.deployment.initial_rate = rate;
    }
    if let Some(name) = args.token_name {
        config.deployment.token_name = name;
    }
    if let Some(symbol) = args.token_symbol {
        config.deployment.token_symbol = symbol;
    }
    config.validate().context("invalid configuration")?;
    config
        .write_to(&config_path)
        .with_context(|| format!("failed to write config to {}", config_path.display()))?;

    tracing::info!(path = %config_path.display(), network = %config.network, "config written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Network        : {}", config.network);
    println!("  Deployer       : {}", config.deployment.deployer);
    println!(
        "  Rate           : {} {} per {}",
        config.deployment.initial_rate, config.deployment.token_symbol, NATIVE_SYMBOL
    );
    for account in &config.genesis {
        println!(
            "  Genesis        : {} ({} {})",
            account.address, account.balance, NATIVE_SYMBOL
        );
    }

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let body = http_get(&args.rpc_url, &args.rpc_url.join("status")).await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }
    Ok(())
}

/// Minimal HTTP/1.1 GET over a raw tokio TCP stream.
async fn http_get(endpoint: &cli::HttpEndpoint, path: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let addr = format!("{}:{}", endpoint.host, endpoint.port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, endpoint.host,
    );
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("ethx-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", PROTOCOL_VERSION);
    println!("rustc     {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that signal is ignored and the other one still works.
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
