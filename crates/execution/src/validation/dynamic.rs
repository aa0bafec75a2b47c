//! Dynamic (post-sender-recovery) validation against account state
//! (§4.D.3).

use alloy_primitives::U256;
use monad_primitives::{Account, TxnError};

use crate::gas::gas_price;
use crate::transaction::Transaction;

/// §4.D.3: EIP-3607 EOA check, nonce match, balance sufficiency.
pub fn dynamic_validate_transaction(tx: &Transaction, sender: &Account, base_fee_per_gas: u64) -> Result<(), TxnError> {
    if sender.has_code() {
        return Err(TxnError::SenderNotEoa);
    }
    if sender.nonce != tx.nonce {
        return Err(TxnError::BadNonce { account: sender.nonce, txn: tx.nonce });
    }

    let price = gas_price(tx, base_fee_per_gas);
    let upfront_cost = U256::from(tx.gas_limit) * U256::from(price) + tx.value;
    if sender.balance < upfront_cost {
        return Err(TxnError::InsufficientBalance);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxType;
    use alloy_primitives::{Address, Bytes};
    use monad_primitives::Incarnation;

    fn sender(balance: u64, nonce: u64) -> Account {
        Account { balance: U256::from(balance), nonce, code_hash: monad_primitives::EMPTY_CODE_HASH, incarnation: Incarnation::GENESIS }
    }

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

    #[test]
    fn insufficient_balance_is_rejected() {
        let s = sender(100, 0);
        assert_eq!(dynamic_validate_transaction(&tx(), &s, 1), Err(TxnError::InsufficientBalance));
    }

    #[test]
    fn nonce_mismatch_is_rejected() {
        let s = sender(10_000_000, 1);
        assert_eq!(dynamic_validate_transaction(&tx(), &s, 1), Err(TxnError::BadNonce { account: 1, txn: 0 }));
    }

    #[test]
    fn valid_sender_passes() {
        let s = sender(10_000_000, 0);
        assert!(dynamic_validate_transaction(&tx(), &s, 1).is_ok());
    }
}
