//! Expiry marking (§4.C.3): flags a subtree for removal once its version
//! falls below a retention bound, while preserving the shape needed to
//! reconstruct hashes for older roots that still reference it.

use std::sync::Arc;

use crate::node::{Child, Node};

/// An upward-accumulator marker produced by walking a trie version looking
/// for subtrees eligible for expiry. Mirrors the node it shadows; doesn't
/// mutate it (nodes are immutable).
#[derive(Debug, Clone)]
pub struct ExpireTNode {
    pub version: u64,
    /// Bit `i` set means `children[i]`'s reference must stay cached in
    /// memory because it may become the sole surviving child of its parent
    /// once this subtree's other children expire (§4.C.3).
    pub cache_mask: u16,
    pub expired: bool,
}

/// Walks `node`, marking every node whose version is below `retention_floor`
/// as expired. A node that survives (any descendant still live) has its
/// `cache_mask` set for children that would become the sole remaining child
/// of their parent if expiry proceeded, so those stay resident.
pub fn mark_expired(node: &Arc<Node>, retention_floor: u64) -> ExpireTNode {
    let children_marks: Vec<(u8, ExpireTNode)> = node
        .children
        .iter()
        .filter_map(|(nibble, child)| match child {
            Child::InMemory(child_node) => Some((*nibble, mark_expired(child_node, retention_floor))),
            Child::OnDisk { .. } => None,
        })
        .collect();

    let live_children = children_marks.iter().filter(|(_, m)| !m.expired).count();
    let mut cache_mask = 0u16;
    if live_children == 1 {
        if let Some((nibble, _)) = children_marks.iter().find(|(_, m)| !m.expired) {
            cache_mask |= 1 << nibble;
        }
    }

    ExpireTNode {
        version: node.version,
        cache_mask,
        expired: node.version < retention_floor && children_marks.iter().all(|(_, m)| m.expired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Compute, EmptyCompute};
    use crate::nibbles::Nibbles;

    fn leaf(version: u64) -> Arc<Node> {
        let mut n = Node::leaf(Nibbles::from_bytes(&[0xab]), b"v".to_vec(), version);
        n.cached_ref = Some(EmptyCompute.compute(&n));
        Arc::new(n)
    }

    #[test]
    fn old_leaf_with_no_children_is_expired() {
        let n = leaf(1);
        let mark = mark_expired(&n, 5);
        assert!(mark.expired);
    }

    #[test]
    fn recent_leaf_is_not_expired() {
        let n = leaf(10);
        let mark = mark_expired(&n, 5);
        assert!(!mark.expired);
    }

    #[test]
    fn branch_with_one_live_child_caches_it() {
        let old_child = leaf(1);
        let live_child = leaf(10);
        let branch = Node::branch(
            Nibbles::new(),
            vec![(0, Child::InMemory(old_child)), (1, Child::InMemory(live_child))],
            None,
            1,
        );
        let mark = mark_expired(&Arc::new(branch), 5);
        assert!(!mark.expired);
        assert_eq!(mark.cache_mask, 1 << 1);
    }
}
