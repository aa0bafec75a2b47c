//! Intrinsic gas, refunds, and block/ommer rewards (§4.D.2, §4.D.4, §4.D.5).
//!
//! Grounded on `execute_transaction.cpp`'s `g_star`/`irrevocable_change`
//! and `validate_block.cpp`'s reward accounting.

use alloy_primitives::U256;
use monad_primitives::Revision;

use crate::transaction::{Transaction, TxType};

const CREATE_GAS: u64 = 32000;
const ACCESS_LIST_ADDRESS_GAS: u64 = 2400;
const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1900;
const AUTH_LIST_ENTRY_GAS: u64 = 25000;
/// EIP-7623: minimum gas charged per non-zero calldata token (Prague+).
const FLOOR_GAS_PER_TOKEN: u64 = 10;
const BASE_TX_GAS: u64 = 21000;

/// §4.D.2: `21000 + (create? 32000 : 0) + sum_bytes(...) + access_list +
/// floor-data-gas (Prague+)`.
pub fn intrinsic_gas(rev: Revision, tx: &Transaction) -> u64 {
    let mut gas = BASE_TX_GAS;
    if tx.is_create() {
        gas += CREATE_GAS;
    }

    let nonzero_gas = rev.nonzero_data_gas();
    let (zero_bytes, nonzero_bytes) = tx.data.iter().fold((0u64, 0u64), |(z, nz), b| if *b == 0 { (z + 1, nz) } else { (z, nz + 1) });
    gas += zero_bytes * 4 + nonzero_bytes * nonzero_gas;

    for entry in &tx.access_list {
        gas += ACCESS_LIST_ADDRESS_GAS;
        gas += entry.storage_keys.len() as u64 * ACCESS_LIST_STORAGE_KEY_GAS;
    }
    gas += tx.authorization_list.len() as u64 * AUTH_LIST_ENTRY_GAS;

    if rev.at_least(Revision::Prague) {
        let tokens = zero_bytes + nonzero_bytes * 4;
        let floor_gas = BASE_TX_GAS + tokens * FLOOR_GAS_PER_TOKEN;
        gas = gas.max(floor_gas);
    }

    gas
}

/// Gas price actually deducted/refunded for a transaction (§4.D.4 step 1).
pub fn gas_price(tx: &Transaction, base_fee_per_gas: u64) -> u128 {
    match tx.tx_type {
        TxType::Legacy | TxType::Eip2930 => tx.gas_price,
        _ => tx.effective_gas_price(base_fee_per_gas as u128),
    }
}

/// YP Eqn 72 (EIP-3529 refund cap): `gas_remaining + min(allowance, refund)`
/// where `allowance = (gas_limit - gas_remaining) / max_refund_quotient`.
pub fn compute_gas_refund(rev: Revision, tx: &Transaction, gas_remaining: u64, refund: u64) -> u64 {
    let max_refund_quotient = if rev.at_least(Revision::London) { 5 } else { 2 };
    let allowance = (tx.gas_limit - gas_remaining) / max_refund_quotient;
    gas_remaining + allowance.min(refund)
}

/// Beneficiary's share of a successful transaction: `(gas_price - base_fee)
/// * gas_used` (§4.D.4 step 4).
pub fn calculate_txn_award(tx: &Transaction, base_fee_per_gas: u64, gas_used: u64) -> U256 {
    let price = gas_price(tx, base_fee_per_gas);
    let tip = price.saturating_sub(base_fee_per_gas as u128);
    U256::from(tip) * U256::from(gas_used)
}

/// One ETH in wei.
const ETHER: u128 = 1_000_000_000_000_000_000;
const BLOCK_REWARD_WEI: u128 = 2 * ETHER;

/// §4.D.5 pre-Paris block award: `beneficiary += 2 ETH + floor(reward/32) *
/// ommers.len`; each ommer's own beneficiary gets a graduated share
/// (`reward * (8 - (block_number - ommer_number)) / 8`), the main
/// beneficiary gets `reward / 32` per ommer (supplemented from
/// `original_source/.../validate_block.cpp`, which spec.md only gestures
/// at).
pub fn block_award(block_number: u64, ommer_numbers: &[u64]) -> BlockAward {
    let mut beneficiary = U256::from(BLOCK_REWARD_WEI);
    let mut ommer_shares = Vec::with_capacity(ommer_numbers.len());
    for &ommer_number in ommer_numbers {
        let distance = block_number - ommer_number;
        let ommer_share = U256::from(BLOCK_REWARD_WEI) * U256::from(8 - distance) / U256::from(8u64);
        ommer_shares.push(ommer_share);
        beneficiary += U256::from(BLOCK_REWARD_WEI) / U256::from(32u64);
    }
    BlockAward { beneficiary, ommer_shares }
}

#[derive(Debug, Clone)]
pub struct BlockAward {
    pub beneficiary: U256,
    /// Parallel to the `ommer_numbers` passed to [`block_award`].
    pub ommer_shares: Vec<U256>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};

    fn tx() -> Transaction {
        Transaction {
            tx_type: TxType::Eip1559,
            chain_id: Some(1),
            nonce: 0,
            gas_limit: 25000,
            gas_price: 0,
            max_fee_per_gas: 10,
            max_priority_fee_per_gas: 10,
            to: Some(Address::ZERO),
            value: U256::from(1_000_000u64),
            data: Bytes::new(),
            access_list: vec![],
            authorization_list: vec![],
            sender: None,
        }
    }

    /// S3: a plain value transfer costs exactly the base 21000.
    #[test]
    fn intrinsic_gas_of_plain_transfer_is_base_cost() {
        assert_eq!(intrinsic_gas(Revision::London, &tx()), 21000);
    }

    #[test]
    fn refund_is_capped_by_quotient() {
        let t = tx();
        // gas_limit=25000, gas_remaining=0 -> allowance = 25000/5 = 5000 post-London
        assert_eq!(compute_gas_refund(Revision::London, &t, 0, 100_000), 5000);
        assert_eq!(compute_gas_refund(Revision::Berlin, &t, 0, 100_000), 12500);
    }

    #[test]
    fn block_award_pre_paris_with_one_ommer() {
        let award = block_award(10, &[9]);
        assert_eq!(award.beneficiary, U256::from(BLOCK_REWARD_WEI + BLOCK_REWARD_WEI / 32));
        assert_eq!(award.ommer_shares[0], U256::from(BLOCK_REWARD_WEI * 7 / 8));
    }
}
