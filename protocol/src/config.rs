// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Protocol Configuration & Constants
//!
//! Every magic number in ETHX lives here, next to the runtime configuration
//! that a node loads at startup. Constants describe the unit system; the
//! [`NodeConfig`] describes one deployment: who deploys the exchange, at
//! what rate, under which token name, and which devnet accounts start out
//! funded.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::amount::{Wad, WAD};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string reported by nodes.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Decimal places of every fixed-point quantity (currency, credits, rate).
pub const CREDIT_DECIMALS: u32 = 18;

/// Ticker of the native currency the engine holds in reserve.
pub const NATIVE_SYMBOL: &str = "ETH";

/// Default exchange rate in whole credits per whole unit of native currency.
pub const DEFAULT_EXCHANGE_RATE: u128 = 1000;

/// Default credit token name.
pub const DEFAULT_TOKEN_NAME: &str = "Testing Token";

/// Default credit token symbol.
pub const DEFAULT_TOKEN_SYMBOL: &str = "lz404";

/// Native balance, in whole units, given to each devnet genesis account.
pub const DEFAULT_GENESIS_BALANCE: u128 = 1000;

/// Labels of the accounts funded by [`NodeConfig::devnet`].
pub const DEVNET_ACCOUNT_LABELS: [&str; 3] = ["deployer", "alice", "bob"];

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default port for the HTTP / JSON-RPC API.
pub const DEFAULT_RPC_PORT: u16 = 8545;

/// Default port for the Prometheus metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9545;

/// Name under which the exchange host snapshot is persisted.
pub const EXCHANGE_CONTRACT_KEY: &str = "exchange";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid config JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The initial exchange rate is zero.
    #[error("initial exchange rate must be nonzero")]
    ZeroRate,

    /// The token name or symbol is blank.
    #[error("token {0} must not be empty")]
    EmptyField(&'static str),

    /// The same address appears twice in the genesis allocation.
    #[error("duplicate genesis account: {0}")]
    DuplicateGenesis(Address),
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// Constructor arguments for the exchange, plus who deploys it.
///
/// The deployer becomes the engine's authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Account that deploys the engine and receives authority.
    pub deployer: Address,
    /// Credits issued per unit of native currency (18-decimal fixed point).
    pub initial_rate: Wad,
    /// Credit token name.
    pub token_name: String,
    /// Credit token symbol.
    pub token_symbol: String,
}

impl DeploymentConfig {
    /// Checks the constructor arguments before anything is deployed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_rate.is_zero() {
            return Err(ConfigError::ZeroRate);
        }
        if self.token_name.trim().is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }
        if self.token_symbol.trim().is_empty() {
            return Err(ConfigError::EmptyField("symbol"));
        }
        Ok(())
    }
}

/// A devnet account funded with native currency at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// The account.
    pub address: Address,
    /// Starting native balance.
    pub balance: Wad,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Full node configuration, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Network name reported by `/status`.
    pub network: String,
    /// HTTP / JSON-RPC port.
    pub rpc_port: u16,
    /// Prometheus metrics port.
    pub metrics_port: u16,
    /// Exchange deployment parameters.
    pub deployment: DeploymentConfig,
    /// Pre-funded accounts.
    #[serde(default)]
    pub genesis: Vec<GenesisAccount>,
}

impl NodeConfig {
    /// Local development defaults: rate 1000, three funded accounts.
    pub fn devnet() -> Self {
        let balance = Wad::from_base_units(DEFAULT_GENESIS_BALANCE * WAD);
        Self {
            network: "devnet".into(),
            rpc_port: DEFAULT_RPC_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            deployment: DeploymentConfig {
                deployer: Address::from_label("deployer"),
                initial_rate: Wad::from_base_units(DEFAULT_EXCHANGE_RATE * WAD),
                token_name: DEFAULT_TOKEN_NAME.into(),
                token_symbol: DEFAULT_TOKEN_SYMBOL.into(),
            },
            genesis: DEVNET_ACCOUNT_LABELS
                .iter()
                .map(|label| GenesisAccount {
                    address: Address::from_label(label),
                    balance,
                })
                .collect(),
        }
    }

    /// Loads and validates a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this config as pretty JSON.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validates the deployment and rejects duplicate genesis entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.deployment.validate()?;
        let mut seen = HashSet::new();
        for account in &self.genesis {
            if !seen.insert(account.address) {
                return Err(ConfigError::DuplicateGenesis(account.address));
            }
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::devnet()
    }
}
