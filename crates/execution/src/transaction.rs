//! Transaction and receipt types (§3, §4.D.2, §4.D.6).

use alloy_primitives::{Address, Bloom, Bytes, B256, U256};

/// Transaction envelope type, per EIP-2718. `TypeNotSupported` (§7) is
/// raised when a transaction's type isn't permitted at the block's
/// revision (§4.D.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    Legacy = 0,
    Eip2930 = 1,
    Eip1559 = 2,
    Eip4844 = 3,
    Eip7702 = 4,
}

impl TxType {
    pub fn is_create(&self, to: Option<Address>) -> bool {
        to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListEntry {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// EIP-7702 authorization-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationEntry {
    pub chain_id: u64,
    pub address: Address,
    pub nonce: u64,
    pub authority: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub tx_type: TxType,
    pub chain_id: Option<u64>,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Legacy/EIP-2930 gas price; ignored (but still present) for
    /// EIP-1559+ where `max_fee_per_gas`/`max_priority_fee_per_gas` apply.
    pub gas_price: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListEntry>,
    pub authorization_list: Vec<AuthorizationEntry>,
    /// Recovered separately (§4.D.3); `None` until ecrecover succeeds.
    pub sender: Option<Address>,
}

impl Transaction {
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// `gas_price` actually paid to the miner/base-fee sink, given the
    /// block's `base_fee_per_gas`. Legacy/2930 pay `gas_price` flat;
    /// 1559+ pay `min(max_fee_per_gas, base_fee + max_priority_fee_per_gas)`.
    pub fn effective_gas_price(&self, base_fee_per_gas: u128) -> u128 {
        match self.tx_type {
            TxType::Legacy | TxType::Eip2930 => self.gas_price,
            _ => {
                let priority = self.max_priority_fee_per_gas.min(self.max_fee_per_gas.saturating_sub(base_fee_per_gas));
                base_fee_per_gas + priority
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// §4.D.1 / §4.D.6: one receipt per executed (non-rejected) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_type: TxType,
    pub status: bool,
    pub gas_used: u64,
    pub bloom: Bloom,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn cumulative_bloom(receipts: &[Receipt]) -> Bloom {
        let mut bloom = Bloom::ZERO;
        for r in receipts {
            for (i, byte) in r.bloom.0.iter().enumerate() {
                bloom.0[i] |= byte;
            }
        }
        bloom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eip1559_effective_price_caps_at_max_fee() {
        let tx = Transaction {
            tx_type: TxType::Eip1559,
            chain_id: Some(1),
            nonce: 0,
            gas_limit: 21000,
            gas_price: 0,
            max_fee_per_gas: 100,
            max_priority_fee_per_gas: 50,
            to: Some(Address::ZERO),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: vec![],
            authorization_list: vec![],
            sender: None,
        };
        assert_eq!(tx.effective_gas_price(90), 100);
        assert_eq!(tx.effective_gas_price(40), 90);
    }
}
