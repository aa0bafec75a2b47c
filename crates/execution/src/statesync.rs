//! State-sync v1 wire frame codec (§6 "External interfaces"): the request
//! header and the tagged upsert frames a sync server streams to a client.
//! Transport (the socket loop driving these frames) is out of scope; only
//! the frame layout is implemented here.
//!
//! Grounded on `original_source/category/statesync/statesync_protocol.cpp`'s
//! `StatesyncProtocolV1::send_request` (the `monad_sync_request` fields)
//! and `handle_upsert` (the `SYNC_TYPE_UPSERT_*` tag dispatch).

use alloy_primitives::{Address, B256};

use monad_primitives::DecodeError;

const REQUEST_LEN: usize = 8 * 5 + 1;

/// A client's range request for one trie-prefix shard, per
/// `send_request`'s `monad_sync_request` literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub prefix: u64,
    pub prefix_bytes: u8,
    pub target: u64,
    pub from: u64,
    pub until: u64,
    pub old_target: u64,
}

impl SyncRequest {
    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        buf[0..8].copy_from_slice(&self.prefix.to_be_bytes());
        buf[8] = self.prefix_bytes;
        buf[9..17].copy_from_slice(&self.target.to_be_bytes());
        buf[17..25].copy_from_slice(&self.from.to_be_bytes());
        buf[25..33].copy_from_slice(&self.until.to_be_bytes());
        buf[33..41].copy_from_slice(&self.old_target.to_be_bytes());
        buf
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() < REQUEST_LEN {
            return Err(DecodeError::InputTooShort);
        }
        Ok(Self {
            prefix: u64::from_be_bytes(raw[0..8].try_into().unwrap()),
            prefix_bytes: raw[8],
            target: u64::from_be_bytes(raw[9..17].try_into().unwrap()),
            from: u64::from_be_bytes(raw[17..25].try_into().unwrap()),
            until: u64::from_be_bytes(raw[25..33].try_into().unwrap()),
            old_target: u64::from_be_bytes(raw[33..41].try_into().unwrap()),
        })
    }

    /// `until` is capped to 99% of the target unless `from` has already
    /// passed that point, per `send_request`.
    pub fn next(progress: Option<u64>, old_target: Option<u64>, target: u64) -> Self {
        let from = progress.map_or(0, |p| p + 1);
        let ninety_nine_pct = target * 99 / 100;
        Self {
            prefix: 0,
            prefix_bytes: 1,
            target,
            from,
            until: if from >= ninety_nine_pct { target } else { ninety_nine_pct },
            old_target: old_target.unwrap_or(target),
        }
    }
}

/// Tags identifying an upsert frame's payload shape, matching the
/// `SYNC_TYPE_UPSERT_*` dispatch in `handle_upsert`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertType {
    Account = 0,
    Storage = 1,
    Code = 2,
    AccountDelete = 3,
    StorageDelete = 4,
    Header = 5,
}

impl UpsertType {
    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Self::Account),
            1 => Ok(Self::Storage),
            2 => Ok(Self::Code),
            3 => Ok(Self::AccountDelete),
            4 => Ok(Self::StorageDelete),
            5 => Ok(Self::Header),
            _ => Err(DecodeError::UnknownType),
        }
    }
}

/// A decoded upsert frame. `Account`/`Storage` upserts carry raw
/// already-RLP-encoded payloads, matching `decode_account_db` /
/// `decode_storage_db`'s deferred-decode boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Account { address: Address, encoded_account: Vec<u8> },
    Storage { address: Address, key: B256, value: B256 },
    Code(Vec<u8>),
    AccountDelete(Address),
    StorageDelete { address: Address, key: B256 },
    Header(Vec<u8>),
}

/// Decodes one upsert frame's payload, given its [`UpsertType`] tag.
/// Mirrors `handle_upsert`'s per-type minimum-size checks.
pub fn decode_upsert(ty: UpsertType, val: &[u8]) -> Result<Upsert, DecodeError> {
    match ty {
        UpsertType::Code => Ok(Upsert::Code(val.to_vec())),
        UpsertType::Account => {
            if val.len() < 20 {
                return Err(DecodeError::InputTooShort);
            }
            let (addr, rest) = val.split_at(20);
            Ok(Upsert::Account { address: Address::from_slice(addr), encoded_account: rest.to_vec() })
        }
        UpsertType::Storage => {
            if val.len() < 20 + 32 + 32 {
                return Err(DecodeError::InputTooShort);
            }
            let address = Address::from_slice(&val[0..20]);
            let key = B256::from_slice(&val[20..52]);
            let value = B256::from_slice(&val[52..84]);
            Ok(Upsert::Storage { address, key, value })
        }
        UpsertType::AccountDelete => {
            if val.len() != 20 {
                return Err(DecodeError::InputTooShort);
            }
            Ok(Upsert::AccountDelete(Address::from_slice(val)))
        }
        UpsertType::StorageDelete => {
            if val.len() < 20 + 32 {
                return Err(DecodeError::InputTooShort);
            }
            let address = Address::from_slice(&val[0..20]);
            let key = B256::from_slice(&val[20..52]);
            Ok(Upsert::StorageDelete { address, key })
        }
        UpsertType::Header => Ok(Upsert::Header(val.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let req = SyncRequest { prefix: 3, prefix_bytes: 1, target: 1000, from: 500, until: 990, old_target: 990 };
        assert_eq!(SyncRequest::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn next_caps_until_at_ninety_nine_percent() {
        let req = SyncRequest::next(None, None, 1000);
        assert_eq!(req.from, 0);
        assert_eq!(req.until, 990);
    }

    #[test]
    fn next_reaches_target_once_past_ninety_nine_percent() {
        let req = SyncRequest::next(Some(995), None, 1000);
        assert_eq!(req.from, 996);
        assert_eq!(req.until, 1000);
    }

    #[test]
    fn account_delete_round_trips() {
        let addr = Address::repeat_byte(7);
        let upsert = decode_upsert(UpsertType::AccountDelete, addr.as_slice()).unwrap();
        assert_eq!(upsert, Upsert::AccountDelete(addr));
    }

    #[test]
    fn storage_upsert_rejects_short_payload() {
        assert!(decode_upsert(UpsertType::Storage, &[0u8; 10]).is_err());
    }
}
