// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CLI Interface
//!
//! Defines the command-line argument structure for `ethx-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`.

use clap::{Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ethx_protocol::Wad;

use crate::logging::LogFormat;

/// Config file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// ETHX devnet node.
///
/// Deploys an ETH/credit exchange from a config file, persists it, and
/// serves it over HTTP / JSON-RPC with Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "ethx-node",
    about = "ETHX exchange devnet node",
    version,
    propagate_version = true
)]
pub struct EthxNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the ETHX node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Write a config file with devnet defaults into the data directory.
    Init(InitArgs),
    /// Query the status of a running node.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (JSON).
    ///
    /// When omitted, the node looks for `config.json` in the data directory
    /// and falls back to devnet defaults.
    #[arg(long, short = 'c', env = "ETHX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory holding the config and the database.
    #[arg(long, short = 'd', env = "ETHX_DATA_DIR", default_value = ".ethx")]
    pub data_dir: PathBuf,

    /// Port for the HTTP / JSON-RPC API. Overrides the config file.
    #[arg(long, env = "ETHX_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint. Overrides the config file.
    #[arg(long, env = "ETHX_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log output format.
    #[arg(
        long,
        env = "ETHX_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,
}

impl RunArgs {
    /// The config file to load: `--config`, else `<data_dir>/config.json`.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.data_dir.join(CONFIG_FILE_NAME))
    }
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "ETHX_DATA_DIR", default_value = ".ethx")]
    pub data_dir: PathBuf,

    /// Network name recorded in the config.
    #[arg(long, default_value = "devnet")]
    pub network: String,

    /// Initial exchange rate, in credits per unit of native currency.
    #[arg(long, env = "ETHX_INITIAL_RATE")]
    pub rate: Option<Wad>,

    /// Credit token name.
    #[arg(long)]
    pub token_name: Option<String>,

    /// Credit token symbol.
    #[arg(long)]
    pub token_symbol: Option<String>,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// HTTP endpoint of the running node.
    #[arg(long, env = "ETHX_RPC_URL", default_value = "http://127.0.0.1:8545")]
    pub rpc_url: HttpEndpoint,
}

// ---------------------------------------------------------------------------
// HttpEndpoint
// ---------------------------------------------------------------------------

/// `http://host[:port][/path]`, just enough to open a TCP connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl HttpEndpoint {
    /// Path of `suffix` below this endpoint.
    pub fn join(&self, suffix: &str) -> String {
        format!(
            "{}/{}",
            self.path.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        )
    }
}

impl FromStr for HttpEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("https://") {
            return Err("https is not supported".into());
        }
        let rest = s.strip_prefix("http://").unwrap_or(s);
        let (authority, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>().map_err(|e| format!("bad port: {e}"))?,
            ),
            None => (authority, 80),
        };
        if host.is_empty() {
            return Err("missing host".into());
        }
        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for HttpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}
