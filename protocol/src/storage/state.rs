// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # World State -- Native-Currency Accounts
//!
//! The world state maps addresses to account states and is the only place
//! native currency exists. A contract's holdings are nothing more than the
//! balance recorded under the contract's own address; the exchange engine's
//! reserve is `world.balance_of(engine.address())`.
//!
//! ## Value Transfers
//!
//! A transfer `from -> to` of amount `A`:
//!
//! 1. Reject the zero address as recipient.
//! 2. Reject recipients that refuse incoming value.
//! 3. Verify `from.balance >= A` and that `to.balance + A` fits.
//! 4. `from.balance -= A`, `to.balance += A`.
//!
//! Every check runs before the first write, so a failed transfer leaves the
//! state exactly as it found it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::address::Address;
use crate::amount::Wad;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced by native-currency state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The sender does not hold enough native currency.
    #[error("insufficient funds: {address} has {available}, needs {requested}")]
    InsufficientFunds {
        /// The debited account.
        address: Address,
        /// Its current balance.
        available: Wad,
        /// The amount requested.
        requested: Wad,
    },

    /// The recipient refuses incoming value.
    #[error("recipient {0} rejected the transfer")]
    RecipientRejected(Address),

    /// Value cannot be sent to the zero address.
    #[error("invalid recipient: zero address")]
    InvalidRecipient,

    /// A balance would exceed the representable range.
    #[error("balance overflow for {0}")]
    Overflow(Address),
}

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// The state of a single account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Number of contracts this account has created.
    pub nonce: u64,
    /// Native currency balance.
    pub balance: Wad,
    /// A frozen account refuses every incoming transfer. Models a
    /// recipient whose receive hook reverts.
    pub frozen: bool,
}

impl AccountState {
    /// An account holding `balance`.
    pub fn with_balance(balance: Wad) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }
}

/// Saved states of a handful of accounts.
///
/// A call that touches the world and then fails in a later step restores the
/// checkpoint, which puts back exactly the accounts it captured (removing
/// any that did not exist yet).
#[derive(Clone, Debug)]
pub struct StateCheckpoint {
    saved: Vec<(Address, Option<AccountState>)>,
}

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// Native-currency accounts keyed by address.
///
/// Backed by a `BTreeMap` so iteration order, and therefore the root hash,
/// never depends on insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    accounts: BTreeMap<Address, AccountState>,
}

impl WorldState {
    /// An empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// The account state for `address`, if it has ever been touched.
    pub fn get(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Inserts or replaces an account.
    pub fn insert(&mut self, address: Address, state: AccountState) {
        self.accounts.insert(address, state);
    }

    /// Iterates accounts in address order.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountState)> {
        self.accounts.iter()
    }

    /// Number of known accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no account exists.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Native balance of `address` (zero for unknown accounts).
    pub fn balance_of(&self, address: &Address) -> Wad {
        self.accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    /// Current nonce of `address`.
    pub fn nonce_of(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    /// Returns the current nonce of `address` and increments it.
    pub fn next_nonce(&mut self, address: &Address) -> u64 {
        let account = self.accounts.entry(*address).or_default();
        let nonce = account.nonce;
        account.nonce += 1;
        nonce
    }

    /// Adds newly issued native currency to `address` (genesis allocation).
    pub fn credit(&mut self, address: &Address, amount: Wad) -> Result<(), StateError> {
        let current = self.balance_of(address);
        let updated = current
            .checked_add(amount)
            .ok_or(StateError::Overflow(*address))?;
        self.accounts.entry(*address).or_default().balance = updated;
        Ok(())
    }

    /// Freezes `address`: incoming transfers fail until it is unfrozen.
    pub fn freeze(&mut self, address: &Address) {
        self.accounts.entry(*address).or_default().frozen = true;
    }

    /// Lets `address` receive value again.
    pub fn unfreeze(&mut self, address: &Address) {
        if let Some(account) = self.accounts.get_mut(address) {
            account.frozen = false;
        }
    }

    /// Moves `amount` of native currency from `from` to `to`.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Wad) -> Result<(), StateError> {
        if to.is_zero() {
            return Err(StateError::InvalidRecipient);
        }
        if self.accounts.get(to).map(|a| a.frozen).unwrap_or(false) {
            return Err(StateError::RecipientRejected(*to));
        }

        let available = self.balance_of(from);
        let debited = available
            .checked_sub(amount)
            .ok_or(StateError::InsufficientFunds {
                address: *from,
                available,
                requested: amount,
            })?;

        if from == to {
            return Ok(());
        }

        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(StateError::Overflow(*to))?;

        self.accounts.entry(*from).or_default().balance = debited;
        self.accounts.entry(*to).or_default().balance = credited;
        Ok(())
    }

    /// Captures the current state of `addresses`.
    pub fn checkpoint(&self, addresses: &[Address]) -> StateCheckpoint {
        StateCheckpoint {
            saved: addresses
                .iter()
                .map(|addr| (*addr, self.accounts.get(addr).cloned()))
                .collect(),
        }
    }

    /// Rolls the captured accounts back to their checkpointed state.
    pub fn restore(&mut self, checkpoint: StateCheckpoint) {
        for (addr, saved) in checkpoint.saved {
            match saved {
                Some(state) => {
                    self.accounts.insert(addr, state);
                }
                None => {
                    self.accounts.remove(&addr);
                }
            }
        }
    }

    /// Sum of every native balance, or `None` if it does not fit in a [`Wad`].
    ///
    /// Each balance is bounded on its own; the sum across accounts is not.
    pub fn total_supply(&self) -> Option<Wad> {
        self.accounts
            .values()
            .try_fold(Wad::ZERO, |acc, a| acc.checked_add(a.balance))
    }

    /// Merkle root over all accounts.
    ///
    /// ```text
    /// leaf   = BLAKE3(addr || nonce_be || balance_be || frozen)
    /// leaves = [ leaf(addr, account) for (addr, account) in address order ]
    /// root   = merkle_root(leaves)
    /// ```
    ///
    /// An odd node at any level is paired with itself. An empty world
    /// returns `[0u8; 32]`.
    pub fn root_hash(&self) -> [u8; 32] {
        if self.accounts.is_empty() {
            return [0u8; 32];
        }

        let mut level: Vec<[u8; 32]> = self
            .accounts
            .iter()
            .map(|(addr, account)| {
                let mut hasher = blake3::Hasher::new();
                hasher.update(addr.as_bytes());
                hasher.update(&account.nonce.to_be_bytes());
                hasher.update(&account.balance.base_units().to_be_bytes());
                hasher.update(&[u8::from(account.frozen)]);
                *hasher.finalize().as_bytes()
            })
            .collect();

        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut hasher = blake3::Hasher::new();
                    hasher.update(&pair[0]);
                    hasher.update(pair.get(1).unwrap_or(&pair[0]));
                    *hasher.finalize().as_bytes()
                })
                .collect();
        }

        level[0]
    }
}
