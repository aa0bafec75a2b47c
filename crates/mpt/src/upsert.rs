//! Versioned upsert (§4.C.1): recursive descent with upward accumulation.
//! Each call builds a new, immutable version of the affected subtree,
//! sharing every untouched child with the previous version.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use monad_storage_pool::{StoragePool, Zone};

use crate::compute::Compute;
use crate::error::{MptError, Result};
use crate::nibbles::Nibbles;
use crate::node::{Child, Node, NodeRef};
use crate::node_codec;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One key/value change to apply in a single upsert call.
#[derive(Debug, Clone)]
pub struct Update {
    pub path: Nibbles,
    pub op: Op,
}

#[derive(Debug, Clone)]
pub enum Op {
    Put(Vec<u8>),
    Delete,
}

impl Update {
    pub fn put(path: Nibbles, value: Vec<u8>) -> Self {
        Self { path, op: Op::Put(value) }
    }

    pub fn delete(path: Nibbles) -> Self {
        Self { path, op: Op::Delete }
    }
}

struct Ctx<'a> {
    pool: &'a StoragePool,
    zone: Zone,
    compute: &'a dyn Compute,
}

/// Applies `updates` to `root`, returning the new root (§4.C.1). Updates are
/// processed in sorted path order; duplicate paths within one call resolve
/// last-writer-wins (§4.C.1 "Within one upsert call...").
pub async fn upsert(
    pool: &StoragePool,
    zone: Zone,
    compute: &dyn Compute,
    root: Option<Arc<Node>>,
    updates: Vec<Update>,
    version: u64,
) -> Result<Option<Arc<Node>>> {
    let updates = prepare(updates)?;
    if updates.is_empty() {
        return Ok(root);
    }
    let ctx = Ctx { pool, zone, compute };
    let node = root.map(Child::InMemory);
    upsert_at(&ctx, node, updates, 0, version).await
}

fn prepare(updates: Vec<Update>) -> Result<Vec<Update>> {
    for u in &updates {
        if u.path.len() > Nibbles::MAX_LEN {
            return Err(MptError::PathTooLong(u.path.len()));
        }
    }
    let mut indexed: Vec<(usize, Update)> = updates.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| a.path.as_slice().cmp(b.path.as_slice()).then(ia.cmp(ib)));
    let mut out: Vec<Update> = Vec::with_capacity(indexed.len());
    for (_, u) in indexed {
        if matches!(out.last(), Some(last) if last.path == u.path) {
            out.pop();
        }
        out.push(u);
    }
    Ok(out)
}

/// Resolves a child to an owned node, issuing a disk read only if it isn't
/// already memory-resident (§4.C.1 "fetching a child from disk...suspends
/// via a read future").
fn load_node<'a>(ctx: &'a Ctx<'a>, child: Child) -> BoxFuture<'a, Result<Arc<Node>>> {
    let pool = ctx.pool;
    let zone = ctx.zone;
    Box::pin(async move { load_node_from(pool, zone, child).await })
}

/// Resolves a child to an owned node without needing a full [`Ctx`] (used by
/// `get`/`copy_node`, which don't need a [`Compute`] strategy).
pub(crate) async fn load_node_from(pool: &StoragePool, zone: Zone, child: Child) -> Result<Arc<Node>> {
    match child {
        Child::InMemory(node) => Ok(node),
        Child::OnDisk { offset, .. } => {
            let decoded = node_codec::read_node(pool, zone, offset).await?;
            let mut children = Vec::with_capacity(decoded.children.len());
            for (nibble, child_offset) in decoded.children {
                let node_ref = node_codec::read_node_ref(pool, child_offset).await?;
                children.push((nibble, Child::OnDisk { offset: child_offset, node_ref }));
            }
            Ok(Arc::new(Node {
                path: decoded.path,
                mask: decoded.mask,
                children,
                leaf_value: decoded.leaf_value,
                cached_ref: Some(decoded.self_ref),
                version: 0,
            }))
        }
    }
}

fn make_node(compute: &dyn Compute, path: Nibbles, mask: u16, children: Vec<(u8, Child)>, leaf_value: Option<Vec<u8>>, version: u64) -> Arc<Node> {
    let mut node = Node {
        path,
        mask,
        children,
        leaf_value,
        cached_ref: None,
        version,
    };
    node.cached_ref = Some(compute.compute(&node));
    Arc::new(node)
}

/// Builds the minimal node and collapses a structurally-redundant single
/// child into an extension merge (§3's single-child invariant).
fn finalize<'a>(
    ctx: &'a Ctx<'a>,
    path_prefix: Nibbles,
    mut children: Vec<(u8, Child)>,
    leaf_value: Option<Vec<u8>>,
    version: u64,
) -> BoxFuture<'a, Result<Option<Arc<Node>>>> {
    Box::pin(async move {
        if children.is_empty() && leaf_value.is_none() {
            return Ok(None);
        }
        if children.is_empty() {
            return Ok(Some(make_node(ctx.compute, path_prefix, 0, Vec::new(), leaf_value, version)));
        }
        if children.len() == 1 && leaf_value.is_none() {
            let (nibble, child) = children.remove(0);
            let inner = load_node(ctx, child).await?;
            let merged_path = path_prefix.concat(&Nibbles::from_nibbles(vec![nibble])).concat(&inner.path);
            return Ok(Some(make_node(
                ctx.compute,
                merged_path,
                inner.mask,
                inner.children.clone(),
                inner.leaf_value.clone(),
                version,
            )));
        }
        let mask = children.iter().fold(0u16, |m, (n, _)| m | (1 << n));
        Ok(Some(make_node(ctx.compute, path_prefix, mask, children, leaf_value, version)))
    })
}

/// Builds a fresh subtree (no existing node) from a group of same-prefix
/// updates, grouping by leading nibble and recursing (§4.C.1 step 1).
fn build_fresh<'a>(ctx: &'a Ctx<'a>, updates: Vec<Update>, depth: usize, version: u64) -> BoxFuture<'a, Result<Option<Arc<Node>>>> {
    Box::pin(async move {
        let puts: Vec<&Update> = updates.iter().filter(|u| matches!(u.op, Op::Put(_))).collect();
        if puts.is_empty() {
            return Ok(None);
        }
        if puts.len() == 1 {
            let u = puts[0];
            let Op::Put(value) = &u.op else { unreachable!() };
            let path = u.path.slice(depth..u.path.len()).to_owned_path();
            return Ok(Some(make_node(ctx.compute, path, 0, Vec::new(), Some(value.clone()), version)));
        }

        let common = common_prefix_from(&puts, depth);
        let terminal = puts.iter().find(|u| u.path.len() == depth + common).and_then(|u| match &u.op {
            Op::Put(v) => Some(v.clone()),
            Op::Delete => None,
        });
        let continuing: Vec<&Update> = puts.iter().filter(|u| u.path.len() > depth + common).copied().collect();
        let path_prefix = puts[0].path.slice(depth..depth + common).to_owned_path();

        let mut children = Vec::new();
        for group in group_by_nibble(&continuing, depth + common) {
            let nibble = group[0].path.get(depth + common);
            let owned: Vec<Update> = group.into_iter().cloned().collect();
            if let Some(child) = build_fresh(ctx, owned, depth + common + 1, version).await? {
                children.push((nibble, Child::InMemory(child)));
            }
        }

        finalize(ctx, path_prefix, children, terminal, version).await
    })
}

/// Minimum common-prefix length, starting at `depth`, shared by every
/// update's path.
fn common_prefix_from(updates: &[&Update], depth: usize) -> usize {
    let first = &updates[0].path;
    let mut len = first.len() - depth;
    for u in &updates[1..] {
        len = len.min(first.view().sub(depth).common_prefix_len(u.path.view().sub(depth)));
    }
    len
}

fn group_by_nibble<'a>(updates: &[&'a Update], at: usize) -> Vec<Vec<&'a Update>> {
    let mut groups: Vec<Vec<&Update>> = Vec::new();
    for &u in updates {
        let nibble = u.path.get(at);
        match groups.last_mut() {
            Some(g) if g[0].path.get(at) == nibble => g.push(u),
            _ => groups.push(vec![u]),
        }
    }
    groups
}

/// Applies `updates` (all sharing the routing prefix that led here) at an
/// existing node, or `None` for an empty subtree (§4.C.1).
fn upsert_at<'a>(ctx: &'a Ctx<'a>, node: Option<Child>, updates: Vec<Update>, depth: usize, version: u64) -> BoxFuture<'a, Result<Option<Arc<Node>>>> {
    Box::pin(async move {
        let Some(child) = node else {
            return build_fresh(ctx, updates, depth, version).await;
        };
        let existing = load_node(ctx, child).await?;
        let node_path_len = existing.path.len();
        let refs: Vec<&Update> = updates.iter().collect();
        let split = common_prefix_from(&refs, depth).min(node_path_len);

        if split < node_path_len {
            return split_and_upsert(ctx, existing, updates, depth, split, version).await;
        }

        let at = depth + node_path_len;
        if existing.is_leaf() {
            return upsert_leaf(ctx, existing, updates, at, version).await;
        }
        upsert_branch(ctx, existing, updates, at, version).await
    })
}

/// Splits an existing node at `split` < its path length, peeling off the
/// divergent residual into a new branch alongside the new updates
/// (§4.C.1 step 3 "split").
async fn split_and_upsert<'a>(ctx: &'a Ctx<'a>, existing: Arc<Node>, updates: Vec<Update>, depth: usize, split: usize, version: u64) -> Result<Option<Arc<Node>>> {
    let path_prefix = existing.path.slice(0..split).to_owned_path();
    let residual_nibble = existing.path.get(split);
    let residual_path = existing.path.slice(split + 1..existing.path.len()).to_owned_path();
    // The residual keeps the old node's children and value under a shorter
    // path, so its hash must be recomputed even along the unmodified arm.
    let residual = make_node(
        ctx.compute,
        residual_path,
        existing.mask,
        existing.children.clone(),
        existing.leaf_value.clone(),
        existing.version,
    );

    let branch_depth = depth + split;
    let terminal_at_branch = updates
        .iter()
        .find(|u| u.path.len() == branch_depth)
        .and_then(|u| match &u.op {
            Op::Put(v) => Some(v.clone()),
            Op::Delete => None,
        });
    let continuing: Vec<&Update> = updates.iter().filter(|u| u.path.len() > branch_depth).collect();

    let mut children = Vec::new();
    let mut residual_handled = false;
    for group in group_by_nibble(&continuing, branch_depth) {
        let nibble = group[0].path.get(branch_depth);
        let owned: Vec<Update> = group.into_iter().cloned().collect();
        if nibble == residual_nibble {
            residual_handled = true;
            let result = upsert_at(ctx, Some(Child::InMemory(residual.clone())), owned, branch_depth + 1, version).await?;
            if let Some(n) = result {
                children.push((nibble, Child::InMemory(n)));
            }
        } else if let Some(n) = build_fresh(ctx, owned, branch_depth + 1, version).await? {
            children.push((nibble, Child::InMemory(n)));
        }
    }
    if !residual_handled {
        children.push((residual_nibble, Child::InMemory(residual)));
    }
    children.sort_by_key(|(n, _)| *n);

    finalize(ctx, path_prefix, children, terminal_at_branch, version).await
}

async fn upsert_leaf<'a>(ctx: &'a Ctx<'a>, existing: Arc<Node>, updates: Vec<Update>, at: usize, version: u64) -> Result<Option<Arc<Node>>> {
    let exact: Vec<&Update> = updates.iter().filter(|u| u.path.len() == at).collect();
    let continuing: Vec<&Update> = updates.iter().filter(|u| u.path.len() > at).collect();

    let terminal_value = match exact.last().map(|u| &u.op) {
        Some(Op::Put(v)) => Some(v.clone()),
        Some(Op::Delete) => None,
        None => existing.leaf_value.clone(),
    };

    if continuing.is_empty() {
        return Ok(match terminal_value {
            Some(v) => Some(make_node(ctx.compute, existing.path.clone(), 0, Vec::new(), Some(v), version)),
            None => None,
        });
    }

    let mut children = Vec::new();
    for group in group_by_nibble(&continuing, at) {
        let nibble = group[0].path.get(at);
        let owned: Vec<Update> = group.into_iter().cloned().collect();
        if let Some(n) = build_fresh(ctx, owned, at + 1, version).await? {
            children.push((nibble, Child::InMemory(n)));
        }
    }

    finalize(ctx, existing.path.clone(), children, terminal_value, version).await
}

async fn upsert_branch<'a>(ctx: &'a Ctx<'a>, existing: Arc<Node>, updates: Vec<Update>, at: usize, version: u64) -> Result<Option<Arc<Node>>> {
    let exact: Vec<&Update> = updates.iter().filter(|u| u.path.len() == at).collect();
    let continuing: Vec<&Update> = updates.iter().filter(|u| u.path.len() > at).collect();

    let leaf_value = match exact.last().map(|u| &u.op) {
        Some(Op::Put(v)) => Some(v.clone()),
        Some(Op::Delete) => None,
        None => existing.leaf_value.clone(),
    };

    let mut children: Vec<(u8, Child)> = existing.children.clone();
    for group in group_by_nibble(&continuing, at) {
        let nibble = group[0].path.get(at);
        let owned: Vec<Update> = group.into_iter().cloned().collect();
        let current = children.iter().position(|(n, _)| *n == nibble).map(|i| children.remove(i).1);
        let result = upsert_at(ctx, current, owned, at + 1, version).await?;
        if let Some(n) = result {
            children.push((nibble, Child::InMemory(n)));
        }
    }
    children.sort_by_key(|(n, _)| *n);

    finalize(ctx, existing.path.clone(), children, leaf_value, version).await
}

/// The node's own cached reference, for callers that already hold an
/// `Arc<Node>` and need its hash without going through [`Compute`] again.
pub fn cached_ref(node: &Node) -> &NodeRef {
    node.cached_ref.as_ref().expect("nodes are always hashed on construction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::MerkleCompute;
    use monad_storage_pool::StoragePool;
    use tempfile::tempdir;

    async fn pool() -> StoragePool {
        let dir = tempdir().unwrap();
        StoragePool::create(&dir.path().join("p.bin"), 4, 1 << 20, 4).unwrap()
    }

    fn key(b: &[u8]) -> Nibbles {
        Nibbles::from_bytes(b)
    }

    #[tokio::test]
    async fn insert_single_key_creates_leaf() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let root = upsert(&pool, Zone::Fast, &compute, None, vec![Update::put(key(b"a"), b"1".to_vec())], 1)
            .await
            .unwrap()
            .unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.leaf_value.as_deref(), Some(&b"1"[..]));
    }

    #[tokio::test]
    async fn insert_two_diverging_keys_creates_branch() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(key(&[0x10]), b"1".to_vec()), Update::put(key(&[0x20]), b"2".to_vec())],
            1,
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!root.is_leaf());
        assert_eq!(root.child_count(), 2);
    }

    #[tokio::test]
    async fn updating_existing_key_preserves_others() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(key(&[0x10]), b"1".to_vec()), Update::put(key(&[0x20]), b"2".to_vec())],
            1,
        )
        .await
        .unwrap()
        .unwrap();

        let root2 = upsert(&pool, Zone::Fast, &compute, Some(root), vec![Update::put(key(&[0x10]), b"updated".to_vec())], 2)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(get(&root2, key(&[0x10]).as_slice()), Some(b"updated".to_vec()));
        assert_eq!(get(&root2, key(&[0x20]).as_slice()), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn deleting_one_of_two_siblings_collapses_to_leaf() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(key(&[0x10]), b"1".to_vec()), Update::put(key(&[0x20]), b"2".to_vec())],
            1,
        )
        .await
        .unwrap()
        .unwrap();

        let root2 = upsert(&pool, Zone::Fast, &compute, Some(root), vec![Update::delete(key(&[0x10]))], 2)
            .await
            .unwrap();
        let root2 = root2.unwrap();
        assert!(!root2.violates_single_child_invariant());
        assert_eq!(get(&root2, key(&[0x20]).as_slice()), Some(b"2".to_vec()));
        assert_eq!(get(&root2, key(&[0x10]).as_slice()), None);
    }

    #[tokio::test]
    async fn deleting_only_key_empties_trie() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let root = upsert(&pool, Zone::Fast, &compute, None, vec![Update::put(key(b"a"), b"1".to_vec())], 1)
            .await
            .unwrap();
        let root2 = upsert(&pool, Zone::Fast, &compute, root, vec![Update::delete(key(b"a"))], 2)
            .await
            .unwrap();
        assert!(root2.is_none());
    }

    #[tokio::test]
    async fn duplicate_path_in_one_call_is_last_writer_wins() {
        let pool = pool().await;
        let compute = MerkleCompute;
        let root = upsert(
            &pool,
            Zone::Fast,
            &compute,
            None,
            vec![Update::put(key(b"a"), b"first".to_vec()), Update::put(key(b"a"), b"second".to_vec())],
            1,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(get(&root, key(b"a").as_slice()), Some(b"second".to_vec()));
    }

    fn get(node: &Node, remaining: &[u8]) -> Option<Vec<u8>> {
        let np = node.path.as_slice();
        if remaining.len() < np.len() || remaining[..np.len()] != *np {
            return None;
        }
        let rest = &remaining[np.len()..];
        if rest.is_empty() {
            return node.leaf_value.clone();
        }
        match node.child(rest[0]) {
            None => None,
            Some(Child::InMemory(child)) => get(child, &rest[1..]),
            Some(Child::OnDisk { .. }) => panic!("test tries never materialize to disk"),
        }
    }
}
