// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Storage Module
//!
//! State and persistence for an ETHX node.
//!
//! ```text
//! state.rs - native-currency accounts, value transfers, state root
//! db.rs    - sled persistence for accounts and contract snapshots
//! ```
//!
//! Contracts mutate a [`WorldState`] in memory; the node commits it to
//! [`ExchangeDB`] together with the contract snapshot after every
//! successful call.

pub mod db;
pub mod state;

pub use db::{DbError, ExchangeDB};
pub use state::{AccountState, StateCheckpoint, StateError, WorldState};
