//! Static transaction validation (§4.D.2). Grounded on
//! `original_source/libs/execution/src/monad/execution/execute_transaction.cpp`'s
//! `validate_transaction` call site.

use monad_primitives::{Revision, TxnError};

use crate::gas::intrinsic_gas;
use crate::transaction::{Transaction, TxType};

const MAX_CODE_SIZE: usize = 24576;

fn type_permitted_at(rev: Revision, ty: TxType) -> bool {
    match ty {
        TxType::Legacy => true,
        TxType::Eip2930 => rev.at_least(Revision::Berlin),
        TxType::Eip1559 => rev.at_least(Revision::London),
        TxType::Eip4844 => rev.at_least(Revision::Cancun),
        TxType::Eip7702 => rev.at_least(Revision::Prague),
    }
}

/// §4.D.2: checks that don't require account state.
pub fn static_validate_transaction(rev: Revision, tx: &Transaction, base_fee_per_gas: u64, chain_id: u64) -> Result<(), TxnError> {
    if !type_permitted_at(rev, tx.tx_type) {
        return Err(TxnError::TypeNotSupported);
    }

    if let Some(tx_chain_id) = tx.chain_id {
        if tx_chain_id != chain_id {
            return Err(TxnError::WrongChainId);
        }
    }

    if rev.at_least(Revision::London) && !matches!(tx.tx_type, TxType::Legacy) {
        if tx.max_fee_per_gas < base_fee_per_gas as u128 {
            return Err(TxnError::MaxFeeLessThanBase);
        }
        if tx.max_priority_fee_per_gas > tx.max_fee_per_gas {
            return Err(TxnError::PriorityFeeGreaterThanMax);
        }
    }

    if rev.at_least(Revision::Shanghai) && tx.is_create() && tx.data.len() > 2 * MAX_CODE_SIZE {
        return Err(TxnError::InitCodeLimitExceeded);
    }

    let intrinsic = intrinsic_gas(rev, tx);
    if intrinsic > tx.gas_limit {
        return Err(TxnError::IntrinsicGasGreaterThanLimit { intrinsic, limit: tx.gas_limit });
    }

    if tx.nonce >= u64::MAX - 1 {
        return Err(TxnError::NonceExceedsMax);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, U256};

    fn tx() -> Transaction {
        Transaction {
            tx_type: TxType::Eip1559,
            chain_id: Some(1),
            nonce: 0,
            gas_limit: 21000,
            gas_price: 0,
            max_fee_per_gas: 29_443_849_433,
            max_priority_fee_per_gas: 100_000_000_000,
            to: Some(Address::ZERO),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: vec![],
            authorization_list: vec![],
            sender: None,
        }
    }

    /// S5: priority fee above max_fee_per_gas is rejected.
    #[test]
    fn priority_fee_above_max_fee_is_rejected() {
        let t = tx();
        assert_eq!(static_validate_transaction(Revision::London, &t, 29_000_000_000, 1), Err(TxnError::PriorityFeeGreaterThanMax));
    }

    #[test]
    fn wrong_chain_id_is_rejected() {
        let mut t = tx();
        t.max_priority_fee_per_gas = 0;
        t.chain_id = Some(2);
        assert_eq!(static_validate_transaction(Revision::London, &t, 0, 1), Err(TxnError::WrongChainId));
    }

    #[test]
    fn legacy_type_always_permitted() {
        let mut t = tx();
        t.tx_type = TxType::Legacy;
        t.max_priority_fee_per_gas = 0;
        t.chain_id = None;
        assert!(static_validate_transaction(Revision::Frontier, &t, 0, 1).is_ok());
    }

    #[test]
    fn eip2930_before_berlin_is_unsupported() {
        let mut t = tx();
        t.tx_type = TxType::Eip2930;
        assert_eq!(static_validate_transaction(Revision::Istanbul, &t, 0, 1), Err(TxnError::TypeNotSupported));
    }
}
