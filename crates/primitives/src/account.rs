use alloy_primitives::{Address, B256, U256};

/// Disambiguates destroyed-and-recreated accounts for storage keying.
///
/// A `(block, txn)` pair: every selfdestruct-then-recreate within a block
/// bumps the incarnation so stale storage slots from the prior life of the
/// account are never read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Incarnation {
    pub block: u64,
    pub txn: u32,
}

impl Incarnation {
    pub const GENESIS: Incarnation = Incarnation { block: 0, txn: 0 };

    pub fn new(block: u64, txn: u32) -> Self {
        Self { block, txn }
    }
}

/// An Ethereum account as stored in the state trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: B256,
    pub incarnation: Incarnation,
}

impl Account {
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code_hash == EMPTY_CODE_HASH
    }

    /// EIP-3607: an account with nonzero code is not a valid transaction sender.
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_CODE_HASH
    }
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: U256::ZERO,
            nonce: 0,
            code_hash: EMPTY_CODE_HASH,
            incarnation: Incarnation::GENESIS,
        }
    }
}

/// `keccak256(b"")`, the code hash of an account with no code.
pub const EMPTY_CODE_HASH: B256 = B256::new(hex_literal::hex!(
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
));

/// A single 32-byte storage slot, keyed by `(address, incarnation, key)` at
/// the call site; the value itself carries no incarnation tag.
pub type StorageValue = U256;

/// Contract bytecode, content-addressed by its keccak256 hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code(pub Vec<u8>);

impl Code {
    pub fn hash(&self) -> B256 {
        alloy_primitives::keccak256(&self.0)
    }
}

/// Per-block state mutation set, as produced by the execution pipeline and
/// consumed by the MPT engine's `upsert`.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    pub accounts: Vec<AccountDelta>,
    pub storage: Vec<StorageDelta>,
    pub new_code: Vec<(B256, Code)>,
}

#[derive(Debug, Clone)]
pub struct AccountDelta {
    pub address: Address,
    pub old: Option<Account>,
    pub new: Option<Account>,
}

#[derive(Debug, Clone)]
pub struct StorageDelta {
    pub address: Address,
    pub incarnation: Incarnation,
    pub key: B256,
    pub old: StorageValue,
    pub new: StorageValue,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.storage.is_empty() && self.new_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_hash_constant_matches_keccak_of_empty_slice() {
        assert_eq!(alloy_primitives::keccak256([]), EMPTY_CODE_HASH);
    }

    #[test]
    fn default_account_is_empty() {
        assert!(Account::default().is_empty());
    }
}
