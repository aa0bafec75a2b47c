//! `VariableStateMachine` (§9 "Polymorphism over compute strategy / state
//! machine"): selects a [`Compute`] strategy per subtree kind, since the
//! state, receipts, and transaction tries are hashed differently (only the
//! state trie's root is consensus-critical; the others may run with a
//! cheaper strategy during replay).

use std::sync::Arc;

use monad_storage_pool::{StoragePool, Zone};

use crate::compute::{Compute, EmptyCompute, MerkleCompute};
use crate::error::Result;
use crate::node::{Child, Node, NodeRef};
use crate::node_codec::{self, EncodedChildren};

/// Which of the three sibling tries a subtree belongs to (§4.C "three
/// sibling tries (state, receipts, transactions)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrieKind {
    State,
    Receipts,
    Transactions,
}

/// Picks a [`Compute`] strategy per trie kind. The state trie is always
/// merkle-hashed (it's consensus-critical); receipts/transactions can run
/// with [`EmptyCompute`] when the pipeline doesn't need their root (e.g.
/// internal replay that never serves `eth_getTransactionReceipt` proofs).
pub struct VariableStateMachine {
    hash_receipts: bool,
    hash_transactions: bool,
}

impl VariableStateMachine {
    pub fn new(hash_receipts: bool, hash_transactions: bool) -> Self {
        Self { hash_receipts, hash_transactions }
    }

    /// The fully-hashing configuration used by a canonical block producer
    /// or full verifying node.
    pub fn full() -> Self {
        Self::new(true, true)
    }

    pub fn compute_for(&self, kind: TrieKind) -> Arc<dyn Compute> {
        match kind {
            TrieKind::State => Arc::new(MerkleCompute),
            TrieKind::Receipts if self.hash_receipts => Arc::new(MerkleCompute),
            TrieKind::Transactions if self.hash_transactions => Arc::new(MerkleCompute),
            _ => Arc::new(EmptyCompute),
        }
    }
}

/// Flushes every in-memory node in `root`'s subtree to the storage pool,
/// bottom-up, replacing `Child::InMemory` with `Child::OnDisk` as each node
/// is written (§4.B "Write buffers" / §6 node format).
pub async fn materialize(pool: &StoragePool, zone: Zone, root: Arc<Node>) -> Result<(Arc<Node>, monad_storage_pool::ChunkOffset)> {
    let (materialized, offset) = materialize_inner(pool, zone, &root).await?;
    Ok((materialized, offset))
}

fn materialize_inner<'a>(
    pool: &'a StoragePool,
    zone: Zone,
    node: &'a Node,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(Arc<Node>, monad_storage_pool::ChunkOffset)>> + Send + 'a>> {
    Box::pin(async move {
        let mut resolved_children = Vec::with_capacity(node.children.len());
        let mut disk_refs = Vec::with_capacity(node.children.len());
        for (nibble, child) in &node.children {
            match child {
                Child::InMemory(child_node) => {
                    let (materialized_child, offset) = materialize_inner(pool, zone, child_node).await?;
                    let node_ref = materialized_child.cached_ref.clone().expect("hashed on construction");
                    resolved_children.push((*nibble, Child::OnDisk { offset, node_ref }));
                    disk_refs.push((*nibble, offset));
                }
                Child::OnDisk { offset, node_ref } => {
                    resolved_children.push((*nibble, Child::OnDisk { offset: *offset, node_ref: node_ref.clone() }));
                    disk_refs.push((*nibble, *offset));
                }
            }
        }

        let self_ref = node.cached_ref.clone().unwrap_or(NodeRef::Inline(Vec::new()));
        let bytes = node_codec::encode_node(EncodedChildren {
            self_ref: &self_ref,
            path: &node.path,
            children: &disk_refs,
            leaf_value: node.leaf_value.as_deref(),
        });
        let offset = node_codec::write_node_bytes(pool, zone, &bytes).await?;

        let materialized = Arc::new(Node {
            path: node.path.clone(),
            mask: node.mask,
            children: resolved_children,
            leaf_value: node.leaf_value.clone(),
            cached_ref: Some(self_ref),
            version: node.version,
        });
        Ok((materialized, offset))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nibbles::Nibbles;
    use crate::upsert::{upsert, Update};
    use tempfile::tempdir;

    #[tokio::test]
    async fn materialize_then_reload_round_trips_value() {
        let dir = tempdir().unwrap();
        let pool = StoragePool::create(&dir.path().join("p.bin"), 4, 1 << 20, 4).unwrap();
        let vsm = VariableStateMachine::full();
        let compute = vsm.compute_for(TrieKind::State);

        let root = upsert(
            &pool,
            Zone::Fast,
            compute.as_ref(),
            None,
            vec![Update::put(Nibbles::from_bytes(b"a"), b"1".to_vec()), Update::put(Nibbles::from_bytes(b"b"), b"2".to_vec())],
            1,
        )
        .await
        .unwrap()
        .unwrap();

        let (materialized, offset) = materialize(&pool, Zone::Fast, root).await.unwrap();
        assert!(matches!(materialized.children.first(), Some((_, Child::OnDisk { .. }))));

        let decoded = node_codec::read_node(&pool, Zone::Fast, offset).await.unwrap();
        assert_eq!(decoded.path.as_slice(), materialized.path.as_slice());
    }

    #[test]
    fn receipts_use_empty_compute_when_not_hashed() {
        let vsm = VariableStateMachine::new(false, false);
        let n = Node::leaf(Nibbles::from_bytes(&[1]), b"v".to_vec(), 1);
        let c = vsm.compute_for(TrieKind::Receipts);
        assert_eq!(c.compute(&n), NodeRef::Inline(Vec::new()));
    }
}
