// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ETHX Exchange Contracts
//!
//! The logic that turns native currency into ledger credits and back:
//!
//! - **Credit Ledger** - fungible balances, allowances, and supply, with
//!   minting and burning gated to a single authority.
//! - **Exchange Engine** - converts deposits into credits at a configurable
//!   rate, redeems credits out of its reserve, and gives its deployer rate
//!   and emergency-withdrawal control.
//! - **Exchange Host** - an engine together with the world state it holds
//!   its reserve in; the unit a node locks and persists.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Amounts are 18-decimal
//!    fixed point, never floats.
//! 2. Every check runs before the first write. A failed call leaves ledger,
//!    reserve, and event logs exactly as they were.
//! 3. Credits are burned before any native currency leaves the engine.
//! 4. Every public type is serializable (serde) for the API and persistent
//!    storage.

pub mod credit_ledger;
pub mod events;
pub mod exchange_engine;
pub mod host;

pub use credit_ledger::{CreditLedger, LedgerError};
pub use events::{EventLog, ExchangeEvent, LedgerEvent, LogEntry};
pub use exchange_engine::{ExchangeEngine, ExchangeError};
pub use host::ExchangeHost;
