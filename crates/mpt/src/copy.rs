//! `copy_node` (§4.C.2): duplicate a leaf subtree at a new path without
//! re-keying its contents. Used by state-sync reorganization.

use std::sync::Arc;

use monad_storage_pool::{StoragePool, Zone};

use crate::compute::Compute;
use crate::error::{MptError, Result};
use crate::nibbles::Nibbles;
use crate::node::Node;
use crate::upsert::{upsert, Update};

/// Locates the leaf at `src`, then splices its value into `dst` using the
/// same recursive-descent machinery as `upsert` (so the same split-on-
/// mismatch and single-child-merge rules apply).
pub async fn copy_node(
    pool: &StoragePool,
    zone: Zone,
    compute: &dyn Compute,
    root: Option<Arc<Node>>,
    src: &Nibbles,
    dst: &Nibbles,
    version: u64,
) -> Result<Option<Arc<Node>>> {
    let value = get(pool, zone, root.clone(), src).await?.ok_or_else(|| MptError::SourceNotFound(src.as_slice().to_vec()))?;
    upsert(pool, zone, compute, root, vec![Update::put(dst.clone(), value)], version).await
}

/// Reads a key's value, resolving on-disk children as needed.
pub async fn get(pool: &StoragePool, zone: Zone, root: Option<Arc<Node>>, key: &Nibbles) -> Result<Option<Vec<u8>>> {
    let Some(mut node) = root else { return Ok(None) };
    let mut remaining = key.as_slice();
    loop {
        let np = node.path.as_slice();
        if remaining.len() < np.len() || remaining[..np.len()] != *np {
            return Ok(None);
        }
        remaining = &remaining[np.len()..];
        if remaining.is_empty() {
            return Ok(node.leaf_value.clone());
        }
        let Some(child) = node.child(remaining[0]).cloned() else { return Ok(None) };
        node = crate::upsert::load_node_from(pool, zone, child).await?;
        remaining = &remaining[1..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::MerkleCompute;
    use monad_storage_pool::StoragePool;
    use tempfile::tempdir;

    #[tokio::test]
    async fn copy_duplicates_value_at_new_path_leaving_others_untouched() {
        let dir = tempdir().unwrap();
        let pool = StoragePool::create(&dir.path().join("p.bin"), 4, 1 << 20, 4).unwrap();
        let compute = MerkleCompute;

        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(Nibbles::from_bytes(b"src"), b"value".to_vec()), Update::put(Nibbles::from_bytes(b"other"), b"keep".to_vec())],
            1,
        )
        .await
        .unwrap();

        let root2 = copy_node(&pool, Zone::Fast, &compute, root.clone(), &Nibbles::from_bytes(b"src"), &Nibbles::from_bytes(b"dst"), 2)
            .await
            .unwrap();

        assert_eq!(get(&pool, Zone::Fast, root2.clone(), &Nibbles::from_bytes(b"dst")).await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(get(&pool, Zone::Fast, root2.clone(), &Nibbles::from_bytes(b"src")).await.unwrap(), Some(b"value".to_vec()));
        assert_eq!(get(&pool, Zone::Fast, root2, &Nibbles::from_bytes(b"other")).await.unwrap(), Some(b"keep".to_vec()));
    }

    #[tokio::test]
    async fn copy_of_missing_source_fails() {
        let dir = tempdir().unwrap();
        let pool = StoragePool::create(&dir.path().join("p.bin"), 4, 1 << 20, 4).unwrap();
        let compute = MerkleCompute;
        let err = copy_node(&pool, Zone::Fast, &compute, None, &Nibbles::from_bytes(b"src"), &Nibbles::from_bytes(b"dst"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MptError::SourceNotFound(_)));
    }
}
