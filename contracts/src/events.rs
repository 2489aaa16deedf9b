// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Event Log
//!
//! Contracts report what they did through an append-only, ordered log.
//! Entries carry a per-log sequence number, the emitting contract's address,
//! and a wall-clock timestamp. Nothing outside this crate can remove or
//! rewrite an entry; the only truncation path is the crate-internal revert
//! used when a call fails after it has already emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ethx_protocol::{Address, Wad};

// ---------------------------------------------------------------------------
// Event Types
// ---------------------------------------------------------------------------

/// Events emitted by the exchange engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    /// Native currency was converted into credits.
    EthToToken {
        sender: Address,
        amount_in: Wad,
        credits_out: Wad,
    },
    /// Credits were redeemed for native currency.
    TokenToEth {
        caller: Address,
        credits_in: Wad,
        amount_out: Wad,
    },
    /// The authority replaced the exchange rate.
    ExchangeRateUpdated { old_rate: Wad, new_rate: Wad },
}

/// Standard fungible-ledger events emitted by the credit ledger.
///
/// Mints are transfers from [`Address::ZERO`]; burns are transfers to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Credits moved between holders.
    Transfer {
        /// Debited holder, or [`Address::ZERO`] for a mint.
        from: Address,
        /// Credited holder, or [`Address::ZERO`] for a burn.
        to: Address,
        /// Credits moved.
        amount: Wad,
    },
    /// An allowance was set.
    Approval {
        /// Holder granting the allowance.
        owner: Address,
        /// Account allowed to spend.
        spender: Address,
        /// New allowance, replacing the old one.
        amount: Wad,
    },
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry<E> {
    /// Position in the log, starting at 0.
    pub sequence: u64,
    /// Contract that emitted the event.
    pub emitter: Address,
    /// The event payload.
    pub event: E,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only event log owned by a single contract.
///
/// Event enums stay externally tagged so the log round-trips through bincode
/// snapshots as well as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog<E> {
    emitter: Address,
    entries: Vec<LogEntry<E>>,
}

impl<E> EventLog<E> {
    /// An empty log for the contract at `emitter`.
    pub fn new(emitter: Address) -> Self {
        Self {
            emitter,
            entries: Vec::new(),
        }
    }

    /// Appends an event and returns its sequence number.
    pub fn emit(&mut self, event: E) -> u64 {
        let sequence = self.entries.len() as u64;
        self.entries.push(LogEntry {
            sequence,
            emitter: self.emitter,
            event,
            recorded_at: Utc::now(),
        });
        sequence
    }

    /// All entries in emission order.
    pub fn entries(&self) -> &[LogEntry<E>] {
        &self.entries
    }

    /// Entries with `sequence >= from`.
    pub fn since(&self, from: u64) -> &[LogEntry<E>] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        &self.entries[start..]
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&LogEntry<E>> {
        self.entries.last()
    }

    /// Just the payloads, in order.
    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was emitted yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries emitted at or after `len` by a call that is being reverted.
    pub(crate) fn revert_to(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}
