// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Credit Ledger Contract
//!
//! The fungible ledger behind the exchange's credits. It tracks balances,
//! allowances, and total supply for a single token, and nothing else: it
//! does not know about native currency or rates.
//!
//! ## Security Model
//!
//! - **Mint gating**: only the `mint_authority` fixed at construction (the
//!   exchange engine) may mint or burn. There is no way to change it.
//! - **Delegated debits**: the engine redeems credits through
//!   [`burn_from`](CreditLedger::burn_from), which consumes the holder's
//!   allowance to the engine before touching the balance.
//! - **Supply tracking**: every mint, burn, and transfer changes balances
//!   and `total_supply` together, so `total_supply == Σ balances` holds
//!   after every call. All checks run before the first write; a failed call
//!   changes nothing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use ethx_protocol::config::CREDIT_DECIMALS;
use ethx_protocol::{Address, Wad};

use crate::events::{EventLog, LedgerEvent};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The caller is not the mint authority.
    #[error("unauthorized: {caller} is not the mint authority")]
    Unauthorized {
        /// Who attempted the call.
        caller: Address,
    },

    /// The account holds fewer credits than requested.
    #[error("insufficient balance: {account} has {available}, tried to move {requested}")]
    InsufficientBalance {
        /// The debited account.
        account: Address,
        /// Its balance.
        available: Wad,
        /// The amount requested.
        requested: Wad,
    },

    /// The spender's allowance from the owner is too small.
    #[error("insufficient allowance: {spender} may spend {available} of {owner}'s credits, requested {requested}")]
    InsufficientAllowance {
        /// Holder of the credits.
        owner: Address,
        /// Account spending on the holder's behalf.
        spender: Address,
        /// Remaining allowance.
        available: Wad,
        /// The amount requested.
        requested: Wad,
    },

    /// Credits cannot be sent to, or approved for, the zero address.
    #[error("invalid recipient: zero address")]
    InvalidRecipient,

    /// Supply or balance arithmetic left the representable range.
    #[error("credit overflow: moving {amount} leaves the representable range")]
    Overflow {
        /// The amount that was attempted.
        amount: Wad,
    },
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Ledger entries touched by a delegated burn, saved so the engine can undo
/// the burn if the payout that follows it fails.
#[derive(Debug, Clone)]
pub(crate) struct LedgerCheckpoint {
    holder: Address,
    spender: Address,
    balance: Option<Wad>,
    allowance: Option<Wad>,
    total_supply: Wad,
    event_count: usize,
}

// ---------------------------------------------------------------------------
// CreditLedger
// ---------------------------------------------------------------------------

/// The credit token: balances, allowances, and supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLedger {
    /// Address of this ledger contract.
    address: Address,
    /// Human-readable name (e.g., "Testing Token").
    name: String,
    /// Ticker symbol (e.g., "lz404").
    symbol: String,
    /// Decimal places; always 18.
    decimals: u32,
    /// The only account allowed to mint and burn.
    mint_authority: Address,
    /// Sum of all balances.
    total_supply: Wad,
    /// Holder balances. Zero balances may or may not have an entry.
    balances: HashMap<Address, Wad>,
    /// `owner -> (spender -> remaining allowance)`.
    allowances: HashMap<Address, HashMap<Address, Wad>>,
    /// Transfer and approval events.
    events: EventLog<LedgerEvent>,
}

impl CreditLedger {
    /// Creates an empty ledger at `address` whose minting is controlled by
    /// `mint_authority`.
    pub fn new(
        address: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        mint_authority: Address,
    ) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals: CREDIT_DECIMALS,
            mint_authority,
            total_supply: Wad::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            events: EventLog::new(address),
        }
    }

    // -- Privileged -----------------------------------------------------------

    /// Creates `amount` new credits in `to`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unauthorized`] if `caller` is not the mint authority.
    /// Returns [`LedgerError::InvalidRecipient`] if `to` is the zero address.
    /// Returns [`LedgerError::Overflow`] if total supply would overflow.
    pub fn mint(&mut self, caller: &Address, to: &Address, amount: Wad) -> Result<(), LedgerError> {
        self.require_authority(caller)?;
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }

        // Balances never exceed supply, so a supply that fits implies a
        // balance that fits.
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;
        let new_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;

        self.total_supply = new_supply;
        self.balances.insert(*to, new_balance);
        self.events.emit(LedgerEvent::Transfer {
            from: Address::ZERO,
            to: *to,
            amount,
        });
        Ok(())
    }

    /// Destroys `amount` credits from `from`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unauthorized`] if `caller` is not the mint authority.
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds too little.
    pub fn burn(&mut self, caller: &Address, from: &Address, amount: Wad) -> Result<(), LedgerError> {
        self.require_authority(caller)?;
        let (remaining, supply) = self.burn_amounts(from, amount)?;
        self.apply_burn(from, remaining, supply, amount);
        Ok(())
    }

    /// Destroys `amount` of `from`'s credits on the strength of the allowance
    /// `from` granted to `caller`. This is the debit redemption uses.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unauthorized`] if `caller` is not the mint authority.
    /// Returns [`LedgerError::InsufficientAllowance`] if the allowance is too small.
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds too little.
    pub fn burn_from(
        &mut self,
        caller: &Address,
        from: &Address,
        amount: Wad,
    ) -> Result<(), LedgerError> {
        self.require_authority(caller)?;
        let remaining_allowance = self.spend_amount(from, caller, amount)?;
        let (remaining, supply) = self.burn_amounts(from, amount)?;

        self.set_allowance(from, caller, remaining_allowance);
        self.apply_burn(from, remaining, supply, amount);
        Ok(())
    }

    // -- Holder operations ----------------------------------------------------

    /// Moves `amount` credits from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRecipient`] if `to` is the zero address.
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds too little.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Wad) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        let (remaining, credited) = self.transfer_amounts(from, to, amount)?;
        self.apply_transfer(from, to, remaining, credited, amount);
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s credits to exactly `amount`.
    ///
    /// Overwrites any previous allowance; it does not add to it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRecipient`] if `spender` is the zero address.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: Wad) -> Result<(), LedgerError> {
        if spender.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        self.set_allowance(owner, spender, amount);
        self.events.emit(LedgerEvent::Approval {
            owner: *owner,
            spender: *spender,
            amount,
        });
        Ok(())
    }

    /// Moves `amount` of `from`'s credits to `to`, consuming the allowance
    /// `from` granted to `spender`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRecipient`] if `to` is the zero address.
    /// Returns [`LedgerError::InsufficientAllowance`] if the allowance is too small.
    /// Returns [`LedgerError::InsufficientBalance`] if `from` holds too little.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Wad,
    ) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        let remaining_allowance = self.spend_amount(from, spender, amount)?;
        let (remaining, credited) = self.transfer_amounts(from, to, amount)?;

        self.set_allowance(from, spender, remaining_allowance);
        self.apply_transfer(from, to, remaining, credited, amount);
        Ok(())
    }

    // -- Reads ----------------------------------------------------------------

    /// Address of this ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Decimal places (18).
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// The account allowed to mint and burn.
    pub fn mint_authority(&self) -> Address {
        self.mint_authority
    }

    /// Total credits in existence.
    pub fn total_supply(&self) -> Wad {
        self.total_supply
    }

    /// Credits held by `account`.
    pub fn balance_of(&self, account: &Address) -> Wad {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Credits `spender` may still move out of `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Wad {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .copied()
            .unwrap_or_default()
    }

    /// Every recorded balance, in arbitrary order.
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Wad)> {
        self.balances.iter()
    }

    /// Number of accounts with a nonzero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| !b.is_zero()).count()
    }

    /// Sum of every balance, recomputed from scratch. Equals
    /// [`total_supply`](Self::total_supply); `None` would mean the balances
    /// no longer fit in a single amount.
    pub fn balances_sum(&self) -> Option<Wad> {
        self.balances
            .values()
            .try_fold(Wad::ZERO, |acc, b| acc.checked_add(*b))
    }

    /// Transfer and approval history.
    pub fn events(&self) -> &EventLog<LedgerEvent> {
        &self.events
    }

    // -- Rollback -------------------------------------------------------------

    pub(crate) fn checkpoint(&self, holder: &Address, spender: &Address) -> LedgerCheckpoint {
        LedgerCheckpoint {
            holder: *holder,
            spender: *spender,
            balance: self.balances.get(holder).copied(),
            allowance: self.allowances.get(holder).and_then(|s| s.get(spender)).copied(),
            total_supply: self.total_supply,
            event_count: self.events.len(),
        }
    }

    pub(crate) fn restore(&mut self, cp: LedgerCheckpoint) {
        match cp.balance {
            Some(b) => {
                self.balances.insert(cp.holder, b);
            }
            None => {
                self.balances.remove(&cp.holder);
            }
        }
        match cp.allowance {
            Some(a) => self.set_allowance(&cp.holder, &cp.spender, a),
            None => {
                if let Some(spenders) = self.allowances.get_mut(&cp.holder) {
                    spenders.remove(&cp.spender);
                }
            }
        }
        self.total_supply = cp.total_supply;
        self.events.revert_to(cp.event_count);
    }

    // -- Internals ------------------------------------------------------------

    fn require_authority(&self, caller: &Address) -> Result<(), LedgerError> {
        if *caller != self.mint_authority {
            return Err(LedgerError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    /// Balance of `account` after removing `amount`, without writing it.
    fn debit_amount(&self, account: &Address, amount: Wad) -> Result<Wad, LedgerError> {
        let available = self.balance_of(account);
        available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                account: *account,
                available,
                requested: amount,
            })
    }

    /// Allowance left after `spender` spends `amount` of `owner`'s credits.
    fn spend_amount(&self, owner: &Address, spender: &Address, amount: Wad) -> Result<Wad, LedgerError> {
        let available = self.allowance(owner, spender);
        available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                available,
                requested: amount,
            })
    }

    fn set_allowance(&mut self, owner: &Address, spender: &Address, amount: Wad) {
        self.allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
    }

    /// `from`'s balance and the total supply after burning `amount`.
    fn burn_amounts(&self, from: &Address, amount: Wad) -> Result<(Wad, Wad), LedgerError> {
        let remaining = self.debit_amount(from, amount)?;
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow { amount })?;
        Ok((remaining, supply))
    }

    /// Balances of `from` and `to` after moving `amount` between them.
    fn transfer_amounts(
        &self,
        from: &Address,
        to: &Address,
        amount: Wad,
    ) -> Result<(Wad, Wad), LedgerError> {
        let remaining = self.debit_amount(from, amount)?;
        let before = if from == to {
            remaining
        } else {
            self.balance_of(to)
        };
        let credited = before
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { amount })?;
        Ok((remaining, credited))
    }

    fn apply_burn(&mut self, from: &Address, remaining: Wad, supply: Wad, amount: Wad) {
        self.balances.insert(*from, remaining);
        self.total_supply = supply;
        self.events.emit(LedgerEvent::Transfer {
            from: *from,
            to: Address::ZERO,
            amount,
        });
    }

    fn apply_transfer(
        &mut self,
        from: &Address,
        to: &Address,
        remaining: Wad,
        credited: Wad,
        amount: Wad,
    ) {
        self.balances.insert(*from, remaining);
        self.balances.insert(*to, credited);
        self.events.emit(LedgerEvent::Transfer {
            from: *from,
            to: *to,
            amount,
        });
    }
}
