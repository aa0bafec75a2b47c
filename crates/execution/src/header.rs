//! Block header and body types (§3 Data Model, §4.D.1).

use alloy_primitives::{Address, Bloom, Bytes, B256, U256};

use monad_primitives::Revision;

/// A consensus block header. Fields that only exist from a given fork
/// onward are `Option`; §4.D.1 checks presence/absence against `rev`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub parent_hash: B256,
    pub ommers_hash: B256,
    pub beneficiary: Address,
    pub state_root: B256,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: B256,
    pub nonce: [u8; 8],
    /// London+.
    pub base_fee_per_gas: Option<u64>,
    /// Shanghai+.
    pub withdrawals_root: Option<B256>,
    /// Cancun+.
    pub blob_gas_used: Option<u64>,
    pub excess_blob_gas: Option<u64>,
    pub parent_beacon_block_root: Option<B256>,
    /// Prague+.
    pub requests_hash: Option<B256>,
}

impl BlockHeader {
    pub fn base_fee_or_zero(&self) -> u64 {
        self.base_fee_per_gas.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawal {
    pub index: u64,
    pub validator_index: u64,
    pub address: Address,
    /// Gwei.
    pub amount: u64,
}

/// A full block: header, ommers, transactions, withdrawals. Parameterized
/// over the caller's transaction type so the execution pipeline doesn't
/// force a single wire representation.
#[derive(Debug, Clone)]
pub struct Block<T> {
    pub header: BlockHeader,
    pub ommers: Vec<BlockHeader>,
    pub transactions: Vec<T>,
    pub withdrawals: Option<Vec<Withdrawal>>,
}

impl<T> Block<T> {
    pub fn revision_fields_present(&self, rev: Revision) -> FieldPresence {
        FieldPresence {
            base_fee: self.header.base_fee_per_gas.is_some(),
            withdrawals_root: self.header.withdrawals_root.is_some(),
            blob_fields: self.header.blob_gas_used.is_some()
                && self.header.excess_blob_gas.is_some()
                && self.header.parent_beacon_block_root.is_some(),
            requests_hash: self.header.requests_hash.is_some(),
            rev,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldPresence {
    pub base_fee: bool,
    pub withdrawals_root: bool,
    pub blob_fields: bool,
    pub requests_hash: bool,
    pub rev: Revision,
}
