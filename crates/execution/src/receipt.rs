//! Log bloom computation (YP Sec 4.3.1), used when building a [`Receipt`].

use alloy_primitives::{keccak256, Bloom};

use crate::transaction::Log;

fn set_bits(bloom: &mut Bloom, data: &[u8]) {
    let hash = keccak256(data);
    for i in [0usize, 2, 4] {
        let bit = u16::from_be_bytes([hash[i], hash[i + 1]]) & 0x7ff;
        let byte_index = 255 - (bit / 8) as usize;
        bloom.0[byte_index] |= 1 << (bit % 8);
    }
}

pub fn bloom_of(logs: &[Log]) -> Bloom {
    let mut bloom = Bloom::ZERO;
    for log in logs {
        set_bits(&mut bloom, log.address.as_slice());
        for topic in &log.topics {
            set_bits(&mut bloom, topic.as_slice());
        }
    }
    bloom
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};

    #[test]
    fn bloom_of_empty_logs_is_zero() {
        assert_eq!(bloom_of(&[]), Bloom::ZERO);
    }

    #[test]
    fn bloom_of_one_log_sets_bits_for_address_and_topics() {
        let log = Log { address: Address::repeat_byte(1), topics: vec![alloy_primitives::B256::repeat_byte(2)], data: Bytes::new() };
        let bloom = bloom_of(&[log]);
        assert_ne!(bloom, Bloom::ZERO);
    }
}
