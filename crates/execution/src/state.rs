//! Block-level state and the per-transaction optimistic overlay (§4.D.4).
//!
//! Grounded on `execute_transaction.cpp`'s `State`/`BlockState` split: a
//! transaction executes against a private overlay seeded from the
//! block-level state, records its read/write sets, and only merges back
//! once every earlier transaction has committed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use parking_lot::RwLock;

use monad_primitives::{Account, Code, Incarnation};

/// Read-only view into committed block state, backed by whatever the
/// caller's state-loading layer is (the MPT engine, in production).
pub trait StateReader: Send + Sync {
    fn account(&self, address: Address) -> Option<Account>;
    fn storage(&self, address: Address, incarnation: Incarnation, key: B256) -> U256;
    fn code(&self, code_hash: B256) -> Option<Arc<Code>>;
}

/// One (address, storage-key) access; `None` key means an account-level
/// access (balance/nonce/code), matching `R_i`/`W_i` in §4.D.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessKey {
    pub address: Address,
    pub storage_key: Option<B256>,
}

/// Merged block-level state: committed account/storage writes plus the
/// union of every committed transaction's write set, used for conflict
/// checks against the next transaction's read set.
pub struct BlockState<S> {
    base: S,
    accounts: RwLock<HashMap<Address, Account>>,
    storage: RwLock<HashMap<(Address, B256), U256>>,
    committed_writes: RwLock<HashSet<AccessKey>>,
}

impl<S: StateReader> BlockState<S> {
    pub fn new(base: S) -> Self {
        Self { base, accounts: RwLock::new(HashMap::new()), storage: RwLock::new(HashMap::new()), committed_writes: RwLock::new(HashSet::new()) }
    }

    pub fn account(&self, address: Address) -> Option<Account> {
        if let Some(a) = self.accounts.read().get(&address) {
            return Some(a.clone());
        }
        self.base.account(address)
    }

    pub fn storage(&self, address: Address, incarnation: Incarnation, key: B256) -> U256 {
        if let Some(v) = self.storage.read().get(&(address, key)) {
            return *v;
        }
        self.base.storage(address, incarnation, key)
    }

    /// §4.D.4 "a fiber may commit ... when `R_i ∩ (∪_{j<i} W_j) = ∅`".
    pub fn can_merge(&self, overlay: &TxOverlay<S>) -> bool {
        let writes = self.committed_writes.read();
        overlay.reads.iter().all(|r| !writes.contains(r))
    }

    /// Applies one transaction's writes and folds its write set into the
    /// block-level committed-writes set, in commit order.
    pub fn merge(&self, overlay: TxOverlay<S>) {
        let mut accounts = self.accounts.write();
        for (address, account) in overlay.account_writes {
            accounts.insert(address, account);
        }
        drop(accounts);

        let mut storage = self.storage.write();
        for ((address, key), value) in overlay.storage_writes {
            storage.insert((address, key), value);
        }
        drop(storage);

        let mut writes = self.committed_writes.write();
        writes.extend(overlay.writes);
    }
}

/// A single transaction's speculative overlay: reads are recorded against
/// the snapshot that existed when the fiber started; writes are buffered
/// until merge. Holds an `Arc` rather than a borrow so a fiber's future is
/// `'static` and can be driven on the scheduler's task pool (§4.D.4).
pub struct TxOverlay<S> {
    block: Arc<BlockState<S>>,
    incarnation: Incarnation,
    reads: HashSet<AccessKey>,
    writes: HashSet<AccessKey>,
    account_writes: HashMap<Address, Account>,
    storage_writes: HashMap<(Address, B256), U256>,
}

impl<S: StateReader> TxOverlay<S> {
    pub fn new(block: Arc<BlockState<S>>, incarnation: Incarnation) -> Self {
        Self {
            block,
            incarnation,
            reads: HashSet::new(),
            writes: HashSet::new(),
            account_writes: HashMap::new(),
            storage_writes: HashMap::new(),
        }
    }

    pub fn read_account(&mut self, address: Address) -> Account {
        self.reads.insert(AccessKey { address, storage_key: None });
        if let Some(a) = self.account_writes.get(&address) {
            return a.clone();
        }
        self.block.account(address).unwrap_or_default()
    }

    pub fn read_storage(&mut self, address: Address, key: B256) -> U256 {
        self.reads.insert(AccessKey { address, storage_key: Some(key) });
        if let Some(v) = self.storage_writes.get(&(address, key)) {
            return *v;
        }
        self.block.storage(address, self.incarnation, key)
    }

    pub fn write_account(&mut self, address: Address, account: Account) {
        self.writes.insert(AccessKey { address, storage_key: None });
        self.account_writes.insert(address, account);
    }

    pub fn write_storage(&mut self, address: Address, key: B256, value: U256) {
        self.writes.insert(AccessKey { address, storage_key: Some(key) });
        self.storage_writes.insert((address, key), value);
    }

    pub fn incarnation(&self) -> Incarnation {
        self.incarnation
    }
}
