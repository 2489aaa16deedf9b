// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ExchangeDB - Persistent Storage Engine
//!
//! The persistence layer for an ETHX node, built on sled's embedded
//! key-value store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                 | Value                      |
//! |-------------|---------------------|----------------------------|
//! | `accounts`  | address (20 bytes)  | `bincode(AccountState)`    |
//! | `contracts` | name (UTF-8)        | `bincode(contract state)`  |
//! | `metadata`  | key (UTF-8)         | value (bytes)              |
//!
//! Contract snapshots are opaque to this layer: any `Serialize` type can be
//! stored under a name, which keeps the protocol crate independent of the
//! contracts built on top of it.
//!
//! ## Atomicity
//!
//! [`ExchangeDB::commit`] writes the world state and a contract snapshot in
//! one multi-tree sled transaction. Either both land on disk or neither
//! does, so a restart never observes a reserve that disagrees with the
//! engine's ledger.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use super::state::{AccountState, WorldState};
use crate::address::{Address, ADDRESS_LENGTH};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<TransactionError<DbError>> for DbError {
    fn from(e: TransactionError<DbError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => DbError::Sled(inner),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Number of commits applied, stored big-endian.
const META_COMMIT_COUNT: &[u8] = b"commit_count";

// ---------------------------------------------------------------------------
// ExchangeDB
// ---------------------------------------------------------------------------

/// Persistent storage for accounts and contract snapshots.
///
/// Cheap to clone; sled handles are reference counted and thread-safe.
#[derive(Debug, Clone)]
pub struct ExchangeDB {
    db: Db,
    accounts: Tree,
    contracts: Tree,
    metadata: Tree,
}

impl ExchangeDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database removed when the handle is dropped.
    ///
    /// Used by unit tests; nothing touches the filesystem.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let contracts = db.open_tree("contracts")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            accounts,
            contracts,
            metadata,
        })
    }

    // -- Accounts -----------------------------------------------------------

    /// Persist a single account.
    pub fn put_account(&self, address: &Address, state: &AccountState) -> DbResult<()> {
        self.accounts.insert(address.as_bytes(), encode(state)?)?;
        Ok(())
    }

    /// Retrieve a single account. `None` if never persisted.
    pub fn get_account(&self, address: &Address) -> DbResult<Option<AccountState>> {
        match self.accounts.get(address.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Rebuild the world state from every persisted account.
    pub fn load_world(&self) -> DbResult<WorldState> {
        let mut world = WorldState::new();
        for entry in self.accounts.iter() {
            let (key, value) = entry?;
            let bytes: [u8; ADDRESS_LENGTH] = key
                .as_ref()
                .try_into()
                .map_err(|_| DbError::Serialization("invalid address key".into()))?;
            world.insert(Address::from_bytes(bytes), decode(&value)?);
        }
        Ok(world)
    }

    /// Replace every persisted account with the accounts of `world`.
    ///
    /// Applied as one sled batch: accounts absent from `world` are removed.
    pub fn put_world(&self, world: &WorldState) -> DbResult<()> {
        let mut batch = sled::Batch::default();
        for entry in self.accounts.iter() {
            let (key, _) = entry?;
            batch.remove(key);
        }
        for (addr, state) in world.accounts() {
            batch.insert(addr.as_bytes().as_slice(), encode(state)?);
        }
        self.accounts.apply_batch(batch)?;
        Ok(())
    }

    // -- Contracts ----------------------------------------------------------

    /// Persist a contract snapshot under `name`.
    pub fn put_contract<T: Serialize>(&self, name: &str, state: &T) -> DbResult<()> {
        self.contracts.insert(name.as_bytes(), encode(state)?)?;
        Ok(())
    }

    /// Retrieve a contract snapshot. `None` if nothing is stored under `name`.
    pub fn get_contract<T: DeserializeOwned>(&self, name: &str) -> DbResult<Option<T>> {
        match self.contracts.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Retrieve a contract snapshot that must exist.
    pub fn require_contract<T: DeserializeOwned>(&self, name: &str) -> DbResult<T> {
        self.get_contract(name)?
            .ok_or_else(|| DbError::NotFound(name.to_string()))
    }

    // -- Atomic commit ------------------------------------------------------

    /// Persist every account of `world` together with a contract snapshot,
    /// atomically, then flush.
    pub fn commit<T: Serialize>(&self, world: &WorldState, name: &str, contract: &T) -> DbResult<()> {
        let encoded_accounts = world
            .accounts()
            .map(|(addr, state)| Ok((*addr, encode(state)?)))
            .collect::<DbResult<Vec<_>>>()?;
        let encoded_contract = encode(contract)?;

        (&self.accounts, &self.contracts, &self.metadata).transaction(
            |(accounts, contracts, metadata)| {
                for (addr, bytes) in &encoded_accounts {
                    accounts.insert(addr.as_bytes().as_slice(), bytes.as_slice())?;
                }
                contracts.insert(name.as_bytes(), encoded_contract.as_slice())?;

                let count = match metadata.get(META_COMMIT_COUNT)? {
                    Some(raw) => read_u64(&raw).map_err(ConflictableTransactionError::Abort)?,
                    None => 0,
                };
                metadata.insert(META_COMMIT_COUNT, &(count + 1).to_be_bytes())?;
                Ok(())
            },
        )?;

        self.db.flush()?;
        tracing::debug!(accounts = encoded_accounts.len(), contract = name, "state committed");
        Ok(())
    }

    /// Number of successful [`commit`](Self::commit) calls.
    pub fn commit_count(&self) -> DbResult<u64> {
        match self.metadata.get(META_COMMIT_COUNT)? {
            Some(raw) => read_u64(&raw),
            None => Ok(0),
        }
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

fn read_u64(raw: &[u8]) -> DbResult<u64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| DbError::Serialization("invalid counter bytes".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Wad;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        rate: Wad,
        label: String,
    }

    fn world_with(label: &str, amount: &str) -> (WorldState, Address) {
        let mut world = WorldState::new();
        let addr = Address::from_label(label);
        world.credit(&addr, Wad::parse(amount).unwrap()).unwrap();
        (world, addr)
    }

    #[test]
    fn account_round_trip() {
        let db = ExchangeDB::open_temporary().unwrap();
        let addr = Address::from_label("alice");
        let state = AccountState::with_balance(Wad::parse("3").unwrap());
        db.put_account(&addr, &state).unwrap();
        assert_eq!(db.get_account(&addr).unwrap(), Some(state));
        assert_eq!(db.get_account(&Address::from_label("nobody")).unwrap(), None);
    }

    #[test]
    fn commit_persists_world_and_contract() {
        let db = ExchangeDB::open_temporary().unwrap();
        let (world, _) = world_with("alice", "12.5");
        let snapshot = Snapshot {
            rate: Wad::parse("1000").unwrap(),
            label: "exchange".into(),
        };

        db.commit(&world, "exchange", &snapshot).unwrap();

        assert_eq!(db.load_world().unwrap(), world);
        assert_eq!(db.get_contract::<Snapshot>("exchange").unwrap(), Some(snapshot));
        assert_eq!(db.commit_count().unwrap(), 1);
    }

    #[test]
    fn put_world_drops_stale_accounts() {
        let db = ExchangeDB::open_temporary().unwrap();
        let (old, stale) = world_with("stale", "1");
        db.put_world(&old).unwrap();

        let (world, alice) = world_with("alice", "4");
        db.put_world(&world).unwrap();

        assert_eq!(db.get_account(&stale).unwrap(), None);
        assert_eq!(db.load_world().unwrap().balance_of(&alice), Wad::parse("4").unwrap());
    }

    #[test]
    fn missing_contract_is_not_found() {
        let db = ExchangeDB::open_temporary().unwrap();
        assert!(db.get_contract::<Snapshot>("exchange").unwrap().is_none());
        assert!(matches!(
            db.require_contract::<Snapshot>("exchange"),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (world, alice) = world_with("alice", "7");
        {
            let db = ExchangeDB::open(dir.path()).unwrap();
            db.commit(&world, "exchange", &"snapshot".to_string()).unwrap();
        }
        let db = ExchangeDB::open(dir.path()).unwrap();
        let restored = db.load_world().unwrap();
        assert_eq!(restored.balance_of(&alice), Wad::parse("7").unwrap());
        assert_eq!(db.commit_count().unwrap(), 1);
    }
}
