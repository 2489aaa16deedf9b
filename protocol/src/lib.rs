// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ETHX Protocol - Core Library
//!
//! Shared primitives for the ETHX exchange: the units money is counted in,
//! the identities that hold it, and the world state it lives in.
//!
//! ## Modules
//!
//! - **amount** - 18-decimal fixed-point [`Wad`] with 256-bit intermediates.
//! - **address** - 20-byte identities and contract address derivation.
//! - **storage** - the native-currency world state and its sled persistence.
//! - **config** - protocol constants and node / deployment configuration.
//!
//! ## Ground Rules
//!
//! 1. No floating point on any path that moves value.
//! 2. Every balance mutation is checked; overflow is an error, never a wrap.
//! 3. A failed state transition leaves the state untouched.

pub mod address;
pub mod amount;
pub mod config;
pub mod storage;

pub use address::Address;
pub use amount::{AmountError, Wad, WAD};
