//! Post-block processing (§4.D.5): block award, withdrawals, and the
//! checks that can reject a whole block.
//!
//! Grounded on `validate_block.cpp`'s end-of-block accounting; root
//! checks against `transactions_root`/`receipts_root`/`state_root` are
//! left to the caller, which owns the MPT engine instance these roots are
//! computed against (this crate only validates the header-computable
//! pieces: `gas_used` and `logs_bloom`).

use alloy_primitives::{Bloom, U256};

use monad_primitives::{BlockError, Revision};

use crate::gas::block_award;
use crate::header::BlockHeader;
use crate::receipt::bloom_of;
use crate::state::{BlockState, StateReader, TxOverlay};
use crate::transaction::Receipt;

/// Applies the pre-Paris block award (coinbase + graduated ommer shares)
/// directly into `block_state`, merging as a synthetic zero-transaction
/// overlay.
pub fn apply_block_award<S: StateReader>(block_state: &std::sync::Arc<BlockState<S>>, header: &BlockHeader, ommer_beneficiaries: &[(alloy_primitives::Address, u64)]) {
    let ommer_numbers: Vec<u64> = ommer_beneficiaries.iter().map(|(_, n)| *n).collect();
    let award = block_award(header.number, &ommer_numbers);

    let mut overlay = TxOverlay::new(block_state.clone(), monad_primitives::Incarnation::new(header.number, 0));
    let mut beneficiary = overlay.read_account(header.beneficiary);
    beneficiary.balance += award.beneficiary;
    overlay.write_account(header.beneficiary, beneficiary);

    for ((ommer_beneficiary, _), share) in ommer_beneficiaries.iter().zip(&award.ommer_shares) {
        let mut account = overlay.read_account(*ommer_beneficiary);
        account.balance += *share;
        overlay.write_account(*ommer_beneficiary, account);
    }

    block_state.merge(overlay);
}

/// Credits withdrawal amounts (Shanghai+; amounts are in Gwei, §3).
pub fn apply_withdrawals<S: StateReader>(block_state: &std::sync::Arc<BlockState<S>>, header: &BlockHeader, withdrawals: &[crate::header::Withdrawal]) {
    if withdrawals.is_empty() {
        return;
    }
    let mut overlay = TxOverlay::new(block_state.clone(), monad_primitives::Incarnation::new(header.number, 0));
    for withdrawal in withdrawals {
        let mut account = overlay.read_account(withdrawal.address);
        account.balance += U256::from(withdrawal.amount) * U256::from(1_000_000_000u64);
        overlay.write_account(withdrawal.address, account);
    }
    block_state.merge(overlay);
}

/// Checks `gas_used` and `logs_bloom` against the header, per §4.D.5.
pub fn check_header_accounting(header: &BlockHeader, receipts: &[Receipt]) -> Result<(), BlockError> {
    let gas_used: u64 = receipts.iter().map(|r| r.gas_used).sum();
    if gas_used != header.gas_used {
        return Err(BlockError::InvalidGasUsed);
    }

    let bloom = cumulative_bloom(receipts);
    if bloom != header.logs_bloom {
        return Err(BlockError::WrongLogsBloom);
    }

    Ok(())
}

fn cumulative_bloom(receipts: &[Receipt]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for receipt in receipts {
        bloom |= bloom_of(&receipt.logs);
    }
    bloom
}

/// Full post-block pipeline: apply rewards, apply withdrawals, then run
/// the in-crate-computable checks. Root checks (`transactions_root`,
/// `receipts_root`, `state_root`) are the caller's responsibility.
pub fn process_block<S: StateReader>(
    block_state: &std::sync::Arc<BlockState<S>>,
    header: &BlockHeader,
    rev: Revision,
    ommer_beneficiaries: &[(alloy_primitives::Address, u64)],
    withdrawals: &[crate::header::Withdrawal],
    receipts: &[Receipt],
) -> Result<(), BlockError> {
    if !rev.at_least(Revision::Paris) {
        apply_block_award(block_state, header, ommer_beneficiaries);
    }
    if rev.at_least(Revision::Shanghai) {
        apply_withdrawals(block_state, header, withdrawals);
    }
    check_header_accounting(header, receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Withdrawal;
    use crate::transaction::{Log, TxType};
    use alloy_primitives::{Address, Bytes, B256};
    use monad_primitives::{Account, Code, Incarnation};
    use std::sync::Arc;

    struct EmptyReader;
    impl StateReader for EmptyReader {
        fn account(&self, _address: Address) -> Option<Account> {
            None
        }
        fn storage(&self, _address: Address, _incarnation: Incarnation, _key: B256) -> U256 {
            U256::ZERO
        }
        fn code(&self, _code_hash: B256) -> Option<Arc<Code>> {
            None
        }
    }

    fn header(number: u64, gas_used: u64, logs_bloom: Bloom) -> BlockHeader {
        BlockHeader {
            parent_hash: B256::ZERO,
            ommers_hash: B256::ZERO,
            beneficiary: Address::repeat_byte(0xa0),
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            logs_bloom,
            difficulty: U256::ZERO,
            number,
            gas_limit: 30_000_000,
            gas_used,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: B256::ZERO,
            nonce: [0; 8],
            base_fee_per_gas: Some(0),
            withdrawals_root: None,
            blob_gas_used: None,
            excess_blob_gas: None,
            parent_beacon_block_root: None,
            requests_hash: None,
        }
    }

    #[test]
    fn pre_paris_award_credits_beneficiary_and_ommers() {
        let block_state = Arc::new(BlockState::new(EmptyReader));
        let beneficiary = Address::repeat_byte(0xa0);
        let ommer_beneficiary = Address::repeat_byte(0xb0);
        let hdr = header(10, 0, Bloom::ZERO);

        apply_block_award(&block_state, &hdr, &[(ommer_beneficiary, 9)]);

        assert!(block_state.account(beneficiary).unwrap().balance > U256::ZERO);
        assert!(block_state.account(ommer_beneficiary).unwrap().balance > U256::ZERO);
    }

    #[test]
    fn withdrawals_credit_in_gwei() {
        let block_state = Arc::new(BlockState::new(EmptyReader));
        let recipient = Address::repeat_byte(1);
        let hdr = header(1, 0, Bloom::ZERO);

        apply_withdrawals(&block_state, &hdr, &[Withdrawal { index: 0, validator_index: 0, address: recipient, amount: 5 }]);

        assert_eq!(block_state.account(recipient).unwrap().balance, U256::from(5_000_000_000u64));
    }

    #[test]
    fn gas_used_mismatch_is_rejected() {
        let hdr = header(1, 100, Bloom::ZERO);
        let receipts = vec![Receipt { tx_type: TxType::Legacy, status: true, gas_used: 21000, bloom: Bloom::ZERO, logs: vec![] }];
        assert_eq!(check_header_accounting(&hdr, &receipts), Err(BlockError::InvalidGasUsed));
    }

    #[test]
    fn matching_gas_used_and_bloom_passes() {
        let log = Log { address: Address::repeat_byte(2), topics: vec![B256::repeat_byte(3)], data: Bytes::new() };
        let bloom = bloom_of(&[log.clone()]);
        let hdr = header(1, 21000, bloom);
        let receipts = vec![Receipt { tx_type: TxType::Legacy, status: true, gas_used: 21000, bloom, logs: vec![log] }];
        assert!(check_header_accounting(&hdr, &receipts).is_ok());
    }
}
