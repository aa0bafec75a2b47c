//! On-disk node serialization (§6 "Persisted state layout"):
//! `[self_ref][path_len: u8][mask: u16][n_children * 8B child_ref][leaf_len: u32][leaf_bytes][path_bytes]`.
//!
//! `n_children` is `mask.count_ones()`; only present children are stored, in
//! ascending nibble order. `leaf_len == u32::MAX` marks "no leaf value" (as
//! opposed to a present, zero-length value).
//!
//! `self_ref` is this node's own cached [`NodeRef`] (§4.C.4), stored ahead of
//! the rest of the record so a parent being loaded from disk can resolve a
//! child's reference with one small read instead of decoding the child's
//! full body (§3's requirement that hash recompute never needs a disk read
//! for an unchanged subtree).

use monad_storage_pool::{ChunkOffset, StoragePool, Zone};

use crate::error::{MptError, Result};
use crate::nibbles::Nibbles;
use crate::node::NodeRef;

const NO_LEAF: u32 = u32::MAX;
const REF_TAG_INLINE: u8 = 0;
const REF_TAG_HASHED: u8 = 1;

/// A node's children and leaf value with children already resolved to their
/// on-disk locations, ready to serialize.
pub struct EncodedChildren<'a> {
    pub self_ref: &'a NodeRef,
    pub path: &'a Nibbles,
    pub children: &'a [(u8, ChunkOffset)],
    pub leaf_value: Option<&'a [u8]>,
}

pub fn encode_node(n: EncodedChildren<'_>) -> Vec<u8> {
    let path_nibbles = n.path.as_slice();
    let mut mask: u16 = 0;
    for (nibble, _) in n.children {
        mask |= 1 << nibble;
    }

    let mut out = Vec::new();
    encode_node_ref(n.self_ref, &mut out);
    out.push(path_nibbles.len() as u8);
    out.extend_from_slice(&mask.to_le_bytes());
    for (_, offset) in n.children {
        out.extend_from_slice(&offset.to_raw().to_le_bytes());
    }
    match n.leaf_value {
        Some(v) => {
            out.extend_from_slice(&(v.len() as u32).to_le_bytes());
            out.extend_from_slice(v);
        }
        None => out.extend_from_slice(&NO_LEAF.to_le_bytes()),
    }
    out.extend_from_slice(&pack_path(path_nibbles));
    out
}

fn encode_node_ref(r: &NodeRef, out: &mut Vec<u8>) {
    match r {
        NodeRef::Inline(bytes) => {
            debug_assert!(bytes.len() < 32);
            out.push(REF_TAG_INLINE);
            out.push(bytes.len() as u8);
            out.extend_from_slice(bytes);
        }
        NodeRef::Hashed(hash) => {
            out.push(REF_TAG_HASHED);
            out.extend_from_slice(hash.as_slice());
        }
    }
}

fn pack_path(nibbles: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nibbles.len().div_ceil(2));
    let mut chunks = nibbles.chunks_exact(2);
    for pair in &mut chunks {
        out.push((pair[0] << 4) | pair[1]);
    }
    if let [last] = chunks.remainder() {
        out.push(last << 4);
    }
    out
}

fn unpack_path(bytes: &[u8], path_len: usize) -> Nibbles {
    let mut nibbles = Vec::with_capacity(path_len);
    for &b in bytes {
        nibbles.push(b >> 4);
        if nibbles.len() < path_len {
            nibbles.push(b & 0x0f);
        }
    }
    nibbles.truncate(path_len);
    Nibbles::from_nibbles(nibbles)
}

/// A decoded on-disk node. Children are left as raw disk locations; the
/// caller resolves each one to a [`crate::node::Child::OnDisk`] by pairing
/// it with a reference fetched via [`read_node_ref`].
pub struct DecodedNode {
    pub self_ref: NodeRef,
    pub path: Nibbles,
    pub mask: u16,
    pub children: Vec<(u8, ChunkOffset)>,
    pub leaf_value: Option<Vec<u8>>,
}

fn advance(offset: ChunkOffset, by: usize) -> ChunkOffset {
    ChunkOffset::new(offset.count(), offset.offset() + by as u32, offset.is_fast())
}

/// Reads just this node's cached reference, the minimum needed to populate
/// a parent's `Child::OnDisk` without decoding the child's whole body.
pub async fn read_node_ref(pool: &StoragePool, offset: ChunkOffset) -> Result<NodeRef> {
    let tag = pool.read(offset, 1).await?;
    match tag[0] {
        REF_TAG_INLINE => {
            let len = pool.read(advance(offset, 1), 1).await?[0] as usize;
            let bytes = pool.read(advance(offset, 2), len).await?;
            Ok(NodeRef::Inline(bytes.to_vec()))
        }
        REF_TAG_HASHED => {
            let bytes = pool.read(advance(offset, 1), 32).await?;
            Ok(NodeRef::Hashed(alloy_primitives::B256::from_slice(&bytes)))
        }
        other => Err(MptError::CorruptNode { tag: other }),
    }
}

fn node_ref_byte_len(tag: u8, inline_len: u8) -> Result<usize> {
    match tag {
        REF_TAG_INLINE => Ok(2 + inline_len as usize),
        REF_TAG_HASHED => Ok(1 + 32),
        other => Err(MptError::CorruptNode { tag: other }),
    }
}

/// Reads and decodes the node at `offset`, issuing a sequence of small reads
/// since the node's total length isn't known up front (§4.C.1 "fetching a
/// child from disk...suspends via a read future").
pub async fn read_node(pool: &StoragePool, _zone: Zone, offset: ChunkOffset) -> Result<DecodedNode> {
    let ref_tag = pool.read(offset, 1).await?[0];
    let inline_len = if ref_tag == REF_TAG_INLINE {
        pool.read(advance(offset, 1), 1).await?[0]
    } else {
        0
    };
    let self_ref = read_node_ref(pool, offset).await?;
    let mut cursor = advance(offset, node_ref_byte_len(ref_tag, inline_len)?);

    let header = pool.read(cursor, 3).await?;
    let path_len = header[0] as usize;
    let mask = u16::from_le_bytes([header[1], header[2]]);
    let n_children = mask.count_ones() as usize;
    cursor = advance(cursor, 3);

    let refs_bytes = if n_children > 0 {
        let bytes = pool.read(cursor, n_children * 8).await?;
        cursor = advance(cursor, n_children * 8);
        bytes
    } else {
        bytes::Bytes::new()
    };

    let leaf_len_bytes = pool.read(cursor, 4).await?;
    cursor = advance(cursor, 4);
    let leaf_len = u32::from_le_bytes(leaf_len_bytes[..4].try_into().expect("4-byte read"));

    let leaf_value = if leaf_len == NO_LEAF {
        None
    } else {
        let v = pool.read(cursor, leaf_len as usize).await?;
        cursor = advance(cursor, leaf_len as usize);
        Some(v.to_vec())
    };

    let path_bytes_len = path_len.div_ceil(2);
    let path_bytes = if path_bytes_len > 0 {
        pool.read(cursor, path_bytes_len).await?
    } else {
        bytes::Bytes::new()
    };

    let mut children = Vec::with_capacity(n_children);
    let mut nibble = 0u8;
    let mut remaining_mask = mask;
    let mut chunk_idx = 0usize;
    while remaining_mask != 0 {
        if remaining_mask & 1 != 0 {
            let raw = u64::from_le_bytes(
                refs_bytes[chunk_idx * 8..chunk_idx * 8 + 8]
                    .try_into()
                    .expect("8-byte child ref"),
            );
            children.push((nibble, ChunkOffset::from_raw(raw)));
            chunk_idx += 1;
        }
        remaining_mask >>= 1;
        nibble += 1;
    }

    Ok(DecodedNode {
        self_ref,
        path: unpack_path(&path_bytes, path_len),
        mask,
        children,
        leaf_value,
    })
}

/// Appends an encoded node's bytes to `zone`'s write stream and returns the
/// physical location they landed at, flushing immediately so the offset is
/// resolvable by the time this returns (§4.B `translate`).
pub async fn write_node_bytes(pool: &StoragePool, zone: Zone, bytes: &[u8]) -> monad_storage_pool::Result<ChunkOffset> {
    let v = pool.reserve_virtual(zone, bytes.len());
    pool.write(zone, v, bytes).await?;
    pool.advance_write_cursor(zone).await?;
    pool.translate(zone, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_path_round_trips_even_and_odd() {
        for nibbles in [vec![1u8, 2, 3, 4], vec![1, 2, 3], vec![], vec![5]] {
            let packed = pack_path(&nibbles);
            let unpacked = unpack_path(&packed, nibbles.len());
            assert_eq!(unpacked.as_slice(), nibbles.as_slice());
        }
    }

    #[test]
    fn encode_node_layout_is_self_describing() {
        let path = Nibbles::from_nibbles(vec![1, 2, 3]);
        let children = vec![(0u8, ChunkOffset::new(1, 100, true)), (5u8, ChunkOffset::new(1, 200, true))];
        let self_ref = NodeRef::Inline(vec![9, 9]);
        let bytes = encode_node(EncodedChildren {
            self_ref: &self_ref,
            path: &path,
            children: &children,
            leaf_value: Some(b"v"),
        });
        assert_eq!(bytes[0], REF_TAG_INLINE);
        assert_eq!(bytes[1], 2);
        let after_ref = 2 + 2;
        assert_eq!(bytes[after_ref], 3);
    }
}
