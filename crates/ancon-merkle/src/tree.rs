//! Versioned AVL tree.
//!
//! [`MutableTree`] owns a single working root plus every saved version. All
//! writes go to the working root and build new nodes along the path to the
//! root, stamped with the version the next save will produce
//! (`latest + 1`). Saved versions are [`ImmutableTree`] snapshots that share
//! untouched subtrees with each other and with the working root.
//!
//! When a [`MerkleStore`] is attached, `save_version` writes the nodes
//! created since the previous save and the version's root record, and
//! [`MutableTree::load`] rebuilds the in-memory versions from it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{MerkleError, MerkleResult};
use crate::hash::{empty_hash, HashValue};
use crate::node::{Node, NodeKind, StoredNode};
use crate::proof::{build_path, KeyProof};
use crate::storage::{MerkleStore, Version};

/// A read-only snapshot of the tree at one version.
#[derive(Clone, Debug)]
pub struct ImmutableTree {
    root: Option<Arc<Node>>,
    version: Version,
}

impl ImmutableTree {
    fn new(root: Option<Arc<Node>>, version: Version) -> Self {
        Self { root, version }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Root hash; SHA-256 of the empty string for an empty tree.
    pub fn hash(&self) -> HashValue {
        self.root.as_ref().map_or_else(empty_hash, |root| root.hash())
    }

    pub fn size(&self) -> u64 {
        self.root.as_ref().map_or(0, |root| root.size())
    }

    pub fn height(&self) -> u8 {
        self.root.as_ref().map_or(0, |root| root.height())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Rank and value of `key`, or `None` when absent.
    pub fn get(&self, key: &[u8]) -> Option<(u64, Vec<u8>)> {
        let root = self.root.as_ref()?;
        match root.get(key) {
            (index, Some(value)) => Some((index, value.to_vec())),
            (_, None) => None,
        }
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Key and value at `index` in sorted key order.
    pub fn get_by_index(&self, index: u64) -> MerkleResult<(Vec<u8>, Vec<u8>)> {
        self.root
            .as_ref()
            .and_then(|root| root.get_by_index(index))
            .map(|(key, value)| (key.to_vec(), value.to_vec()))
            .ok_or(MerkleError::IndexOutOfBounds {
                index,
                size: self.size(),
            })
    }

    /// Entries with keys in `[start, end)`. Either bound may be open.
    pub fn iterate_range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        ascending: bool,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.collect_range(start, end, &mut out);
        }
        if !ascending {
            out.reverse();
        }
        out
    }

    /// Value of `key` with a path proof against this snapshot's root.
    pub fn get_with_proof(&self, key: &[u8]) -> MerkleResult<(Vec<u8>, KeyProof)> {
        match &self.root {
            Some(root) => build_path(root, key),
            None => Err(MerkleError::key_not_found(key)),
        }
    }
}

/// The working tree together with its saved history.
pub struct MutableTree {
    root: Option<Arc<Node>>,
    latest: Version,
    versions: BTreeMap<Version, ImmutableTree>,
    store: Option<Arc<dyn MerkleStore>>,
}

impl Default for MutableTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MutableTree {
    /// An empty, purely in-memory tree.
    pub fn new() -> Self {
        Self {
            root: None,
            latest: 0,
            versions: BTreeMap::new(),
            store: None,
        }
    }

    /// An empty tree that persists saved versions to `store`.
    ///
    /// Nothing is read from the store; use [`MutableTree::load`] to resume
    /// from persisted versions.
    pub fn with_store(store: Arc<dyn MerkleStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    /// Rebuild every persisted version up to `target` (0 = latest) and make
    /// the working tree start from it.
    pub fn load(store: Arc<dyn MerkleStore>, target: Version) -> MerkleResult<Self> {
        let persisted = store.list_versions()?;
        let target = if target == 0 {
            persisted.last().copied().unwrap_or(0)
        } else if persisted.contains(&target) {
            target
        } else {
            return Err(MerkleError::VersionNotFound { version: target });
        };

        let mut cache = HashMap::new();
        let mut versions = BTreeMap::new();
        for version in persisted.into_iter().filter(|v| *v <= target) {
            let root = match store.get_root(version)? {
                Some(Some(hash)) => Some(load_node(store.as_ref(), &hash, &mut cache)?),
                Some(None) => None,
                None => {
                    return Err(MerkleError::StorageError(format!(
                        "root record for version {} disappeared during load",
                        version
                    )))
                }
            };
            versions.insert(version, ImmutableTree::new(root, version));
        }

        let root = versions.get(&target).and_then(|tree| tree.root.clone());
        info!(
            version = target,
            versions = versions.len(),
            nodes = cache.len(),
            "Loaded merkle tree from store"
        );

        Ok(Self {
            root,
            latest: target,
            versions,
            store: Some(store),
        })
    }

    /// [`MutableTree::load`] followed by dropping every persisted version
    /// above the loaded one, so saves can continue from `target`.
    pub fn load_for_overwriting(store: Arc<dyn MerkleStore>, target: Version) -> MerkleResult<Self> {
        let mut tree = Self::with_store(store);
        tree.load_version_for_overwriting(target)?;
        Ok(tree)
    }

    /// Make saved version `target` (0 = latest) the working tree, discarding
    /// unsaved changes. Returns the loaded version.
    ///
    /// With a store the history is rebuilt from it and versions above
    /// `target` stay persisted; saving over them fails with
    /// `VersionConflict` until they are overwritten. Without a store the
    /// in-memory history is the only copy, so versions above `target` are
    /// dropped.
    pub fn load_version(&mut self, target: Version) -> MerkleResult<Version> {
        match self.store.clone() {
            Some(store) => *self = Self::load(store, target)?,
            None => self.truncate_history(target)?,
        }
        Ok(self.latest)
    }

    /// Like [`MutableTree::load_version`], then delete the root records of
    /// every persisted version above the loaded one.
    pub fn load_version_for_overwriting(&mut self, target: Version) -> MerkleResult<Version> {
        let version = self.load_version(target)?;
        if let Some(store) = &self.store {
            let dropped = store.delete_roots_after(version)?;
            store.flush()?;
            if !dropped.is_empty() {
                info!(version, dropped = ?dropped, "Dropped versions for overwriting");
            }
        }
        Ok(version)
    }

    fn truncate_history(&mut self, target: Version) -> MerkleResult<()> {
        let target = if target == 0 { self.latest } else { target };
        if target != 0 && !self.versions.contains_key(&target) {
            return Err(MerkleError::VersionNotFound { version: target });
        }
        self.versions.split_off(&(target + 1));
        self.latest = target;
        self.rollback();
        Ok(())
    }

    /// Snapshot of the working tree, including unsaved changes.
    pub fn working_tree(&self) -> ImmutableTree {
        ImmutableTree::new(self.root.clone(), self.latest + 1)
    }

    /// Insert or update `key`. Returns `true` when an existing key was updated.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> MerkleResult<bool> {
        if key.is_empty() {
            return Err(MerkleError::InvalidArgument("key must not be empty".to_string()));
        }
        if value.is_empty() {
            return Err(MerkleError::InvalidArgument("value must not be empty".to_string()));
        }

        let version = self.latest + 1;
        let (root, updated) = match &self.root {
            None => (Arc::new(Node::new_leaf(key.to_vec(), value.to_vec(), version)), false),
            Some(root) => set_recursive(root, key, value, version),
        };
        self.root = Some(root);

        debug!(key = %hex::encode(key), updated, "Set key in working tree");
        Ok(updated)
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &[u8]) -> MerkleResult<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(MerkleError::InvalidArgument("key must not be empty".to_string()));
        }
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let version = self.latest + 1;
        match remove_recursive(root, key, version) {
            Some(removal) => {
                self.root = removal.node;
                debug!(key = %hex::encode(key), "Removed key from working tree");
                Ok(Some(removal.value))
            }
            None => Ok(None),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<(u64, Vec<u8>)> {
        self.working_tree().get(key)
    }

    pub fn get_by_index(&self, index: u64) -> MerkleResult<(Vec<u8>, Vec<u8>)> {
        self.working_tree().get_by_index(index)
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.working_tree().has(key)
    }

    /// Root hash of the working tree.
    pub fn hash(&self) -> HashValue {
        self.root.as_ref().map_or_else(empty_hash, |root| root.hash())
    }

    pub fn size(&self) -> u64 {
        self.root.as_ref().map_or(0, |root| root.size())
    }

    pub fn height(&self) -> u8 {
        self.root.as_ref().map_or(0, |root| root.height())
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn iterate_range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        ascending: bool,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.working_tree().iterate_range(start, end, ascending)
    }

    pub fn get_with_proof(&self, key: &[u8]) -> MerkleResult<(Vec<u8>, KeyProof)> {
        self.working_tree().get_with_proof(key)
    }

    /// Latest saved version, 0 before the first save.
    pub fn version(&self) -> Version {
        self.latest
    }

    pub fn available_versions(&self) -> Vec<Version> {
        self.versions.keys().copied().collect()
    }

    pub fn version_exists(&self, version: Version) -> bool {
        self.versions.contains_key(&version)
    }

    pub fn get_immutable(&self, version: Version) -> MerkleResult<ImmutableTree> {
        self.versions
            .get(&version)
            .cloned()
            .ok_or(MerkleError::VersionNotFound { version })
    }

    pub fn get_versioned(&self, version: Version, key: &[u8]) -> MerkleResult<Option<(u64, Vec<u8>)>> {
        Ok(self.get_immutable(version)?.get(key))
    }

    pub fn get_versioned_with_proof(
        &self,
        version: Version,
        key: &[u8],
    ) -> MerkleResult<(Vec<u8>, KeyProof)> {
        self.get_immutable(version)?.get_with_proof(key)
    }

    /// Snapshot the working tree as version `latest + 1`.
    ///
    /// With a store attached, the new nodes and the root record are written
    /// before the version becomes visible. If the store already holds that
    /// version with the same root the save is a no-op write; with a
    /// different root it fails with `VersionConflict`.
    pub fn save_version(&mut self) -> MerkleResult<(HashValue, Version)> {
        let version = self.latest + 1;
        let hash = self.hash();

        if let Some(store) = &self.store {
            match store.get_root(version)? {
                Some(existing) => {
                    let existing = existing.unwrap_or_else(empty_hash);
                    if existing != hash {
                        return Err(MerkleError::VersionConflict { version });
                    }
                    debug!(version, "Version already persisted with identical root");
                }
                None => {
                    let mut batch = Vec::new();
                    if let Some(root) = &self.root {
                        collect_new_nodes(root, version, &mut batch);
                    }
                    store.batch_put_nodes(&batch)?;
                    store.put_root(version, self.root.as_ref().map(|root| root.hash()).as_ref())?;
                    store.flush()?;
                    debug!(version, nodes = batch.len(), "Persisted version");
                }
            }
        }

        self.versions
            .insert(version, ImmutableTree::new(self.root.clone(), version));
        self.latest = version;

        info!(version, hash = %hash, size = self.size(), "Saved tree version");
        Ok((hash, version))
    }

    /// Discard unsaved changes; the working tree returns to the latest saved version.
    pub fn rollback(&mut self) {
        self.root = self
            .versions
            .get(&self.latest)
            .and_then(|tree| tree.root.clone());
        debug!(version = self.latest, "Rolled back working tree");
    }
}

fn set_recursive(node: &Arc<Node>, key: &[u8], value: &[u8], version: i64) -> (Arc<Node>, bool) {
    match node.kind() {
        NodeKind::Leaf { .. } => {
            let leaf = Arc::new(Node::new_leaf(key.to_vec(), value.to_vec(), version));
            match key.cmp(node.key()) {
                Ordering::Less => (
                    Arc::new(Node::new_inner(node.key().to_vec(), leaf, node.clone(), version)),
                    false,
                ),
                Ordering::Equal => (leaf, true),
                Ordering::Greater => (
                    Arc::new(Node::new_inner(key.to_vec(), node.clone(), leaf, version)),
                    false,
                ),
            }
        }
        NodeKind::Inner { left, right } => {
            let (left, right, updated) = if key < node.key() {
                let (left, updated) = set_recursive(left, key, value, version);
                (left, right.clone(), updated)
            } else {
                let (right, updated) = set_recursive(right, key, value, version);
                (left.clone(), right, updated)
            };
            if updated {
                (Arc::new(Node::new_inner(node.key().to_vec(), left, right, version)), true)
            } else {
                (balance(node.key().to_vec(), left, right, version), false)
            }
        }
    }
}

struct Removal {
    /// Replacement subtree, `None` when the subtree became empty.
    node: Option<Arc<Node>>,
    /// New leftmost key of the subtree, when it changed.
    new_key: Option<Vec<u8>>,
    value: Vec<u8>,
}

fn remove_recursive(node: &Arc<Node>, key: &[u8], version: i64) -> Option<Removal> {
    match node.kind() {
        NodeKind::Leaf { value } => (node.key() == key).then(|| Removal {
            node: None,
            new_key: None,
            value: value.clone(),
        }),
        NodeKind::Inner { left, right } => {
            if key < node.key() {
                let removal = remove_recursive(left, key, version)?;
                match removal.node {
                    None => Some(Removal {
                        node: Some(right.clone()),
                        new_key: Some(node.key().to_vec()),
                        value: removal.value,
                    }),
                    Some(new_left) => Some(Removal {
                        node: Some(balance(node.key().to_vec(), new_left, right.clone(), version)),
                        new_key: removal.new_key,
                        value: removal.value,
                    }),
                }
            } else {
                let removal = remove_recursive(right, key, version)?;
                match removal.node {
                    None => Some(Removal {
                        node: Some(left.clone()),
                        new_key: None,
                        value: removal.value,
                    }),
                    Some(new_right) => {
                        let split = removal.new_key.unwrap_or_else(|| node.key().to_vec());
                        Some(Removal {
                            node: Some(balance(split, left.clone(), new_right, version)),
                            new_key: None,
                            value: removal.value,
                        })
                    }
                }
            }
        }
    }
}

/// Build an inner node over `left` and `right`, rotating if they differ in
/// height by more than one.
fn balance(key: Vec<u8>, left: Arc<Node>, right: Arc<Node>, version: i64) -> Arc<Node> {
    let factor = i16::from(left.height()) - i16::from(right.height());
    if factor > 1 {
        if left.balance_factor() >= 0 {
            rotate_right(key, left, right, version)
        } else {
            let left = match left.children() {
                Some((ll, lr)) => rotate_left(left.key().to_vec(), ll.clone(), lr.clone(), version),
                None => left,
            };
            rotate_right(key, left, right, version)
        }
    } else if factor < -1 {
        if right.balance_factor() <= 0 {
            rotate_left(key, left, right, version)
        } else {
            let right = match right.children() {
                Some((rl, rr)) => rotate_right(right.key().to_vec(), rl.clone(), rr.clone(), version),
                None => right,
            };
            rotate_left(key, left, right, version)
        }
    } else {
        Arc::new(Node::new_inner(key, left, right, version))
    }
}

/// `key(left(ll, lr), right)` becomes `left.key(ll, key(lr, right))`.
fn rotate_right(key: Vec<u8>, left: Arc<Node>, right: Arc<Node>, version: i64) -> Arc<Node> {
    match left.children() {
        Some((ll, lr)) => {
            let new_right = Arc::new(Node::new_inner(key, lr.clone(), right, version));
            Arc::new(Node::new_inner(left.key().to_vec(), ll.clone(), new_right, version))
        }
        None => Arc::new(Node::new_inner(key, left, right, version)),
    }
}

/// `key(left, right(rl, rr))` becomes `right.key(key(left, rl), rr)`.
fn rotate_left(key: Vec<u8>, left: Arc<Node>, right: Arc<Node>, version: i64) -> Arc<Node> {
    match right.children() {
        Some((rl, rr)) => {
            let new_left = Arc::new(Node::new_inner(key, left, rl.clone(), version));
            Arc::new(Node::new_inner(right.key().to_vec(), new_left, rr.clone(), version))
        }
        None => Arc::new(Node::new_inner(key, left, right, version)),
    }
}

/// Nodes stamped with `version` are the ones created since the last save;
/// anything older is already persisted, along with its whole subtree.
fn collect_new_nodes(node: &Arc<Node>, version: i64, out: &mut Vec<(HashValue, StoredNode)>) {
    if node.version() != version {
        return;
    }
    if let Some((left, right)) = node.children() {
        collect_new_nodes(left, version, out);
        collect_new_nodes(right, version, out);
    }
    out.push((node.hash(), StoredNode::from_node(node)));
}

fn load_node(
    store: &dyn MerkleStore,
    hash: &HashValue,
    cache: &mut HashMap<HashValue, Arc<Node>>,
) -> MerkleResult<Arc<Node>> {
    if let Some(node) = cache.get(hash) {
        return Ok(node.clone());
    }

    let stored = store
        .get_node(hash)?
        .ok_or_else(|| MerkleError::StorageError(format!("missing node {}", hash)))?;
    let node = match (stored.value, stored.left, stored.right) {
        (Some(value), None, None) => Node::new_leaf(stored.key, value, stored.version),
        (None, Some(left), Some(right)) => {
            let left = load_node(store, &left, cache)?;
            let right = load_node(store, &right, cache)?;
            Node::new_inner(stored.key, left, right, stored.version)
        }
        _ => {
            return Err(MerkleError::SerializationError(format!(
                "malformed stored node {}",
                hash
            )))
        }
    };
    if node.hash() != *hash {
        return Err(MerkleError::StorageError(format!(
            "node hash mismatch: expected {}, computed {}",
            hash,
            node.hash()
        )));
    }

    let node = Arc::new(node);
    cache.insert(*hash, node.clone());
    Ok(node)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;
    use crate::storage::{InMemoryMerkleStore, MerkleRootStore};

    const D: &str = "94ee7455e38ba1286d6f8e8317485dd90e8d9ced4795e233270868ce3f74814e";

    fn tree_with(entries: &[(&str, &str)]) -> MutableTree {
        let mut tree = MutableTree::new();
        for (k, v) in entries {
            tree.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        tree
    }

    fn check(tree: &MutableTree) {
        if let Some(root) = &tree.root {
            root.check_invariants();
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = MutableTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.size(), 0);
        assert_eq!(tree.version(), 0);
        assert_eq!(tree.hash(), empty_hash());
        assert_eq!(tree.get(b"missing"), None);
        assert!(tree.get_with_proof(b"missing").unwrap_err().is_key_not_found());
        assert_eq!(
            tree.get_by_index(0).unwrap_err(),
            MerkleError::IndexOutOfBounds { index: 0, size: 0 }
        );
    }

    #[test]
    fn test_three_keys_digest() {
        let tree = tree_with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        assert_eq!(tree.hash().to_hex(), D);
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.height(), 2);
        check(&tree);
    }

    #[test]
    fn test_hash_independent_of_insertion_order() {
        let orders = [
            ["a", "b", "c"],
            ["a", "c", "b"],
            ["b", "a", "c"],
            ["b", "c", "a"],
            ["c", "a", "b"],
            ["c", "b", "a"],
        ];
        for order in orders {
            let mut tree = MutableTree::new();
            for key in order {
                let value = match key {
                    "a" => "1",
                    "b" => "2",
                    _ => "3",
                };
                tree.set(key.as_bytes(), value.as_bytes()).unwrap();
            }
            assert_eq!(tree.hash().to_hex(), D, "order {:?}", order);
        }
    }

    #[test]
    fn test_set_reports_update() {
        let mut tree = MutableTree::new();
        assert!(!tree.set(b"k", b"v1").unwrap());
        assert!(tree.set(b"k", b"v2").unwrap());
        assert_eq!(tree.get(b"k"), Some((0, b"v2".to_vec())));
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_set_rejects_empty_input() {
        let mut tree = tree_with(&[("a", "1")]);
        let before = tree.hash();
        assert!(matches!(tree.set(b"", b"x"), Err(MerkleError::InvalidArgument(_))));
        assert!(matches!(tree.set(b"x", b""), Err(MerkleError::InvalidArgument(_))));
        assert_eq!(tree.hash(), before);
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_rank_and_index() {
        let tree = tree_with(&[("d", "4"), ("b", "2"), ("a", "1"), ("c", "3"), ("e", "5")]);
        for (i, key) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            assert_eq!(tree.get(key.as_bytes()).unwrap().0, i as u64);
            assert_eq!(tree.get_by_index(i as u64).unwrap().0, key.as_bytes().to_vec());
        }
        assert!(tree.get_by_index(5).is_err());
    }

    #[test]
    fn test_sequential_inserts_stay_balanced() {
        let mut tree = MutableTree::new();
        for i in 0u32..256 {
            tree.set(&i.to_be_bytes(), b"v").unwrap();
        }
        check(&tree);
        assert_eq!(tree.size(), 256);
        assert!(tree.height() <= 11);
    }

    #[test]
    fn test_remove() {
        let mut tree = tree_with(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")]);
        assert_eq!(tree.remove(b"zz").unwrap(), None);
        assert_eq!(tree.remove(b"a").unwrap(), Some(b"1".to_vec()));
        check(&tree);
        assert_eq!(tree.remove(b"c").unwrap(), Some(b"3".to_vec()));
        check(&tree);
        assert!(!tree.has(b"a"));
        assert!(!tree.has(b"c"));
        assert_eq!(tree.get(b"d"), Some((1, b"4".to_vec())));
        assert_eq!(tree.size(), 3);

        for key in ["b", "d", "e"] {
            assert!(tree.remove(key.as_bytes()).unwrap().is_some());
            check(&tree);
        }
        assert!(tree.is_empty());
        assert_eq!(tree.hash(), empty_hash());
        assert!(tree.remove(b"").is_err());
    }

    #[test]
    fn test_remove_matches_fresh_build() {
        // Removing the rightmost key of a three-key tree leaves the same
        // shape as building the remaining two directly.
        let mut tree = tree_with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        tree.remove(b"c").unwrap();
        let fresh = tree_with(&[("a", "1"), ("b", "2")]);
        assert_eq!(tree.hash(), fresh.hash());
    }

    #[test]
    fn test_iterate_range() {
        let tree = tree_with(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]);
        let keys = |entries: Vec<(Vec<u8>, Vec<u8>)>| {
            entries
                .into_iter()
                .map(|(k, _)| String::from_utf8(k).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(keys(tree.iterate_range(None, None, true)), ["a", "b", "c", "d"]);
        assert_eq!(keys(tree.iterate_range(Some(b"b"), Some(b"d"), true)), ["b", "c"]);
        assert_eq!(keys(tree.iterate_range(Some(b"bb"), None, false)), ["d", "c"]);
        assert!(tree.iterate_range(Some(b"x"), None, true).is_empty());
    }

    #[test]
    fn test_save_and_snapshot_isolation() {
        let mut tree = tree_with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let (hash, version) = tree.save_version().unwrap();
        assert_eq!((hash.to_hex().as_str(), version), (D, 1));

        tree.set(b"b", b"20").unwrap();
        tree.set(b"d", b"4").unwrap();
        tree.save_version().unwrap();

        assert_eq!(tree.get_versioned(1, b"b").unwrap(), Some((1, b"2".to_vec())));
        assert_eq!(tree.get_versioned(1, b"d").unwrap(), None);
        assert_eq!(tree.get_versioned(2, b"b").unwrap(), Some((1, b"20".to_vec())));
        assert_eq!(tree.get_immutable(1).unwrap().hash().to_hex(), D);
        assert_eq!(tree.available_versions(), vec![1, 2]);

        let err = tree.get_versioned(999, b"a").unwrap_err();
        assert_eq!(err, MerkleError::VersionNotFound { version: 999 });
        assert!(!tree.version_exists(999));
    }

    #[test]
    fn test_working_nodes_carry_next_version() {
        let mut tree = tree_with(&[("a", "1")]);
        tree.save_version().unwrap();
        tree.set(b"b", b"2").unwrap();
        let (_, proof) = tree.get_with_proof(b"b").unwrap();
        assert_eq!(proof.leaves[0].version, 2);
        let (_, proof) = tree.get_with_proof(b"a").unwrap();
        assert_eq!(proof.leaves[0].version, 1);
    }

    #[test]
    fn test_rollback_discards_unsaved() {
        let mut tree = tree_with(&[("a", "1")]);
        let (saved, _) = tree.save_version().unwrap();
        tree.set(b"b", b"2").unwrap();
        tree.remove(b"a").unwrap();
        tree.rollback();
        assert_eq!(tree.hash(), saved);
        assert!(tree.has(b"a"));
        assert!(!tree.has(b"b"));

        let mut fresh = MutableTree::new();
        fresh.set(b"a", b"1").unwrap();
        fresh.rollback();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_versioned_proof_replays_to_version_root() {
        let mut tree = tree_with(&[("a", "1"), ("b", "2")]);
        let (v1_hash, _) = tree.save_version().unwrap();
        tree.set(b"a", b"11").unwrap();
        tree.save_version().unwrap();

        let (value, proof) = tree.get_versioned_with_proof(1, b"a").unwrap();
        assert_eq!(value, b"1".to_vec());
        proof.verify_item(&v1_hash, b"a", b"1").unwrap();
        assert!(tree.get_versioned_with_proof(3, b"a").unwrap_err().is_version_not_found());
        assert!(tree.get_versioned_with_proof(1, b"z").unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_persist_and_load() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut tree = MutableTree::with_store(store.clone());
        tree.set(b"a", b"1").unwrap();
        tree.set(b"b", b"2").unwrap();
        let (h1, _) = tree.save_version().unwrap();
        tree.set(b"c", b"3").unwrap();
        let (h2, _) = tree.save_version().unwrap();
        tree.remove(b"a").unwrap();
        let (h3, _) = tree.save_version().unwrap();

        let loaded = MutableTree::load(store.clone(), 0).unwrap();
        assert_eq!(loaded.version(), 3);
        assert_eq!(loaded.hash(), h3);
        assert_eq!(loaded.get_immutable(1).unwrap().hash(), h1);
        assert_eq!(loaded.get_immutable(2).unwrap().hash(), h2);
        assert_eq!(loaded.get_versioned(2, b"a").unwrap(), Some((0, b"1".to_vec())));

        let older = MutableTree::load(store.clone(), 2).unwrap();
        assert_eq!(older.hash(), h2);
        assert_eq!(older.available_versions(), vec![1, 2]);

        assert!(matches!(MutableTree::load(store, 7), Err(e) if e.is_version_not_found()));
    }

    #[test]
    fn test_load_empty_store() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let tree = MutableTree::load(store, 0).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.version(), 0);
    }

    #[test]
    fn test_empty_version_persists() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut tree = MutableTree::with_store(store.clone());
        tree.save_version().unwrap();
        assert_eq!(store.get_root(1).unwrap(), Some(None));
        let loaded = MutableTree::load(store, 0).unwrap();
        assert_eq!(loaded.version(), 1);
        assert_eq!(loaded.hash(), empty_hash());
    }

    #[test]
    fn test_save_persists_only_new_nodes() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut tree = MutableTree::with_store(store.clone());
        for key in ["a", "b", "c", "d"] {
            tree.set(key.as_bytes(), b"v").unwrap();
        }
        tree.save_version().unwrap();
        // 4 leaves + 3 inner nodes.
        assert_eq!(store.node_count(), 7);

        tree.set(b"d", b"w").unwrap();
        tree.save_version().unwrap();
        // New leaf plus its ancestors up to the root.
        assert_eq!(store.node_count(), 7 + 1 + usize::from(tree.height()));
    }

    #[test]
    fn test_version_conflict() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut first = MutableTree::with_store(store.clone());
        first.set(b"a", b"1").unwrap();
        let (hash, _) = first.save_version().unwrap();

        let mut diverged = MutableTree::with_store(store.clone());
        diverged.set(b"a", b"2").unwrap();
        assert_eq!(
            diverged.save_version().unwrap_err(),
            MerkleError::VersionConflict { version: 1 }
        );
        assert_eq!(diverged.version(), 0);

        let mut same = MutableTree::with_store(store);
        same.set(b"a", b"1").unwrap();
        assert_eq!(same.save_version().unwrap(), (hash, 1));
    }

    #[test]
    fn test_overwriting_unblocks_saves_after_older_load() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut tree = MutableTree::with_store(store.clone());
        tree.set(b"k", b"1").unwrap();
        let (h1, _) = tree.save_version().unwrap();
        tree.set(b"k", b"2").unwrap();
        tree.save_version().unwrap();

        // A plain load of version 1 cannot save a different version 2.
        let mut stuck = MutableTree::load(store.clone(), 1).unwrap();
        stuck.set(b"k", b"3").unwrap();
        assert_eq!(
            stuck.save_version().unwrap_err(),
            MerkleError::VersionConflict { version: 2 }
        );

        assert_eq!(stuck.load_version_for_overwriting(1).unwrap(), 1);
        assert_eq!(stuck.hash(), h1);
        assert_eq!(store.list_versions().unwrap(), vec![1]);

        stuck.set(b"k", b"3").unwrap();
        let (h2, version) = stuck.save_version().unwrap();
        assert_eq!(version, 2);

        let reloaded = MutableTree::load(store, 0).unwrap();
        assert_eq!(reloaded.hash(), h2);
        assert_eq!(reloaded.get(b"k"), Some((0, b"3".to_vec())));
        assert_eq!(reloaded.get_versioned(1, b"k").unwrap(), Some((0, b"1".to_vec())));
    }

    #[test]
    fn test_load_for_overwriting_from_store() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut tree = MutableTree::with_store(store.clone());
        for value in ["1", "2", "3"] {
            tree.set(b"k", value.as_bytes()).unwrap();
            tree.save_version().unwrap();
        }

        let mut tree = MutableTree::load_for_overwriting(store.clone(), 2).unwrap();
        assert_eq!(tree.version(), 2);
        assert_eq!(tree.available_versions(), vec![1, 2]);
        assert_eq!(store.list_versions().unwrap(), vec![1, 2]);
        tree.set(b"k", b"9").unwrap();
        assert_eq!(tree.save_version().unwrap().1, 3);

        assert!(matches!(
            MutableTree::load_for_overwriting(store, 8),
            Err(e) if e.is_version_not_found()
        ));
    }

    #[test]
    fn test_load_version_keeps_later_versions_in_store() {
        let store = Arc::new(InMemoryMerkleStore::new());
        let mut tree = MutableTree::with_store(store.clone());
        tree.set(b"a", b"1").unwrap();
        tree.save_version().unwrap();
        tree.set(b"b", b"2").unwrap();
        let (h2, _) = tree.save_version().unwrap();

        tree.set(b"c", b"3").unwrap();
        assert_eq!(tree.load_version(1).unwrap(), 1);
        assert!(!tree.has(b"b"));
        assert!(!tree.has(b"c"));
        assert_eq!(store.list_versions().unwrap(), vec![1, 2]);

        assert_eq!(tree.load_version(0).unwrap(), 2);
        assert_eq!(tree.hash(), h2);
        assert!(tree.load_version(5).unwrap_err().is_version_not_found());
        assert_eq!(tree.version(), 2);
    }

    #[test]
    fn test_load_version_without_store_truncates_history() {
        let mut tree = MutableTree::new();
        tree.set(b"a", b"1").unwrap();
        let (h1, _) = tree.save_version().unwrap();
        tree.set(b"b", b"2").unwrap();
        tree.save_version().unwrap();

        assert_eq!(tree.load_version(1).unwrap(), 1);
        assert_eq!(tree.hash(), h1);
        assert_eq!(tree.available_versions(), vec![1]);

        tree.set(b"c", b"3").unwrap();
        assert_eq!(tree.save_version().unwrap().1, 2);
        assert!(tree.load_version(7).unwrap_err().is_version_not_found());
    }

    proptest! {
        #[test]
        fn prop_round_trip_and_rank(
            writes in proptest::collection::vec(
                (proptest::collection::vec(any::<u8>(), 1..6), proptest::collection::vec(any::<u8>(), 1..6)),
                0..80,
            )
        ) {
            let mut tree = MutableTree::new();
            let mut expected = BTreeMap::new();
            for (key, value) in &writes {
                tree.set(key, value).unwrap();
                expected.insert(key.clone(), value.clone());
            }

            prop_assert_eq!(tree.size(), expected.len() as u64);
            check(&tree);
            let mut previous: Option<Vec<u8>> = None;
            for (rank, (key, value)) in expected.iter().enumerate() {
                prop_assert_eq!(tree.get(key), Some((rank as u64, value.clone())));
                let (at_index, _) = tree.get_by_index(rank as u64).unwrap();
                prop_assert_eq!(&at_index, key);
                if let Some(prev) = &previous {
                    prop_assert!(prev < &at_index);
                }
                previous = Some(at_index);

                let (_, proof) = tree.get_with_proof(key).unwrap();
                prop_assert_eq!(proof.compute_root_hash().unwrap(), tree.hash());
            }
        }

        #[test]
        fn prop_remove_keeps_invariants(
            keys in proptest::collection::btree_set(proptest::collection::vec(any::<u8>(), 1..4), 1..60),
            stride in 1usize..4,
        ) {
            let mut tree = MutableTree::new();
            for key in &keys {
                tree.set(key, b"v").unwrap();
            }
            let mut remaining = keys.clone();
            for key in keys.iter().step_by(stride) {
                prop_assert_eq!(tree.remove(key).unwrap(), Some(b"v".to_vec()));
                remaining.remove(key);
                check(&tree);
            }
            prop_assert_eq!(tree.size(), remaining.len() as u64);
            for key in &remaining {
                prop_assert!(tree.has(key));
            }
        }
    }
}
