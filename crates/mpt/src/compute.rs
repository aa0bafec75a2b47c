//! State-root computation strategies (§4.C.4).

use alloy_primitives::{keccak256, B256};
use alloy_rlp::BufMut;

use crate::node::{Child, Node, NodeRef};

/// Wraps already-RLP-encoded bytes so they can be spliced verbatim into a
/// surrounding list without being re-wrapped as a string.
struct RawRlp<'a>(&'a [u8]);

impl<'a> alloy_rlp::Encodable for RawRlp<'a> {
    fn encode(&self, out: &mut dyn BufMut) {
        out.put_slice(self.0);
    }

    fn length(&self) -> usize {
        self.0.len()
    }
}

/// Returns the RLP bytes directly if short enough to inline, otherwise
/// their keccak-256 hash (§4.C.4 "to_node_reference").
pub fn to_node_reference(rlp: Vec<u8>) -> NodeRef {
    if rlp.len() < 32 {
        NodeRef::Inline(rlp)
    } else {
        NodeRef::Hashed(keccak256(&rlp))
    }
}

fn child_reference(child: &Child) -> NodeRef {
    match child {
        Child::InMemory(node) => node
            .cached_ref
            .clone()
            .unwrap_or_else(|| panic!("hash recompute reached a child with no cached reference")),
        Child::OnDisk { node_ref, .. } => node_ref.clone(),
    }
}

fn encode_item(list: &mut Vec<u8>, reference: Option<&NodeRef>) {
    match reference {
        None => {
            // Empty slot: RLP empty string (0x80).
            encode_empty_string(list);
        }
        Some(NodeRef::Hashed(hash)) => alloy_rlp::Encodable::encode(hash, list),
        Some(NodeRef::Inline(bytes)) => RawRlp(bytes).encode(list),
    }
}

fn encode_empty_string(out: &mut Vec<u8>) {
    let empty: &[u8] = b"";
    alloy_rlp::Encodable::encode(empty, out);
}

/// A state-root computation strategy: whether and how a subtree's nodes
/// get a real hash, per §4.C.4 ("empty compute is allowed for non-hashed
/// subtries such as internal receipts during replay").
pub trait Compute: Send + Sync {
    fn compute(&self, node: &Node) -> NodeRef;
}

/// Computes no real hash; every node reference is the empty string. Used
/// for subtries the pipeline never needs a merkle root for.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCompute;

impl Compute for EmptyCompute {
    fn compute(&self, _node: &Node) -> NodeRef {
        NodeRef::Inline(Vec::new())
    }
}

/// The real Ethereum MPT hashing strategy (§4.C.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct MerkleCompute;

impl MerkleCompute {
    fn leaf_rlp(path_rlp: &[u8], value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let header = alloy_rlp::Header {
            list: true,
            payload_length: rlp_str_len(path_rlp) + rlp_str_len(value),
        };
        header.encode(&mut out);
        alloy_rlp::Encodable::encode(&path_rlp, &mut out);
        alloy_rlp::Encodable::encode(&value, &mut out);
        out
    }

    fn branch_rlp(node: &Node) -> Vec<u8> {
        let refs: Vec<Option<NodeRef>> = (0u8..16)
            .map(|nibble| node.child(nibble).map(child_reference))
            .collect();
        let value_len = node.leaf_value.as_deref().map(rlp_str_len).unwrap_or(1);
        let mut payload_length = value_len;
        let mut encoded_items = Vec::with_capacity(16);
        for r in &refs {
            let mut item = Vec::new();
            encode_item(&mut item, r.as_ref());
            payload_length += item.len();
            encoded_items.push(item);
        }

        let mut out = Vec::new();
        let header = alloy_rlp::Header { list: true, payload_length };
        header.encode(&mut out);
        for item in encoded_items {
            out.extend_from_slice(&item);
        }
        match &node.leaf_value {
            Some(v) => alloy_rlp::Encodable::encode(v, &mut out),
            None => encode_empty_string(&mut out),
        }
        out
    }
}

fn rlp_str_len(bytes: &[u8]) -> usize {
    let mut buf = Vec::new();
    alloy_rlp::Encodable::encode(&bytes, &mut buf);
    buf.len()
}

impl Compute for MerkleCompute {
    fn compute(&self, node: &Node) -> NodeRef {
        if node.is_leaf() {
            let path_rlp_bytes = node.path.compact_encode(true);
            let mut path_rlp = Vec::new();
            alloy_rlp::Encodable::encode(&path_rlp_bytes, &mut path_rlp);
            let value = node.leaf_value.as_deref().unwrap_or(&[]);
            let mut value_rlp = Vec::new();
            alloy_rlp::Encodable::encode(&value, &mut value_rlp);
            return to_node_reference(Self::leaf_rlp(&path_rlp, &value_rlp));
        }

        let branch_rlp = Self::branch_rlp(node);
        if node.path.is_empty() {
            return to_node_reference(branch_rlp);
        }

        // Extension + branch: wrap the branch's reference with this node's
        // own path prefix.
        let branch_ref = to_node_reference(branch_rlp);
        let path_rlp_bytes = node.path.compact_encode(false);
        let mut out = Vec::new();
        let path_item_len = rlp_str_len(&path_rlp_bytes);
        let ref_item_len = match &branch_ref {
            NodeRef::Inline(bytes) => bytes.len(),
            NodeRef::Hashed(h) => rlp_str_len(h.as_slice()),
        };
        let header = alloy_rlp::Header {
            list: true,
            payload_length: path_item_len + ref_item_len,
        };
        header.encode(&mut out);
        alloy_rlp::Encodable::encode(&path_rlp_bytes, &mut out);
        match &branch_ref {
            NodeRef::Inline(bytes) => RawRlp(bytes).encode(&mut out),
            NodeRef::Hashed(h) => alloy_rlp::Encodable::encode(h, &mut out),
        }
        to_node_reference(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nibbles::Nibbles;

    #[test]
    fn empty_leaf_is_deterministic() {
        let node = Node::leaf(Nibbles::from_bytes(&[0xab]), b"hello".to_vec(), 1);
        let a = MerkleCompute.compute(&node);
        let b = MerkleCompute.compute(&node);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_compute_always_returns_empty() {
        let node = Node::leaf(Nibbles::from_bytes(&[0xab]), b"hello".to_vec(), 1);
        assert_eq!(EmptyCompute.compute(&node), NodeRef::Inline(Vec::new()));
    }

    #[test]
    fn to_node_reference_inlines_short_rlp() {
        let short = vec![1, 2, 3];
        assert_eq!(to_node_reference(short.clone()), NodeRef::Inline(short));
        let long = vec![0u8; 40];
        match to_node_reference(long) {
            NodeRef::Hashed(_) => {}
            NodeRef::Inline(_) => panic!("expected hashed reference"),
        }
    }
}
