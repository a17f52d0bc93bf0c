//! Storage traits for Merkle tree persistence.
//!
//! The tree treats its persistence backend as an injected dependency. Nodes
//! are stored by hash; each saved version stores its root hash (or `None`
//! for an empty tree). Implementations can use RocksDB (see the
//! `ancon-storage` crate), an in-memory map, or any remote key-value store.
//!
//! # Layout
//!
//! ```text
//! nodes:  node_hash      -> StoredNode
//! roots:  version (i64)  -> Option<HashValue>
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::MerkleResult;
use crate::hash::HashValue;
use crate::node::StoredNode;

/// Tree version identifier.
pub type Version = i64;

/// A trait for storing and retrieving tree nodes by hash.
pub trait MerkleNodeStore: Send + Sync {
    /// Store a node by its hash.
    fn put_node(&self, hash: &HashValue, node: &StoredNode) -> MerkleResult<()>;

    /// Retrieve a node by its hash.
    fn get_node(&self, hash: &HashValue) -> MerkleResult<Option<StoredNode>>;

    /// Check if a node exists.
    fn has_node(&self, hash: &HashValue) -> MerkleResult<bool>;

    /// Batch put multiple nodes atomically.
    fn batch_put_nodes(&self, nodes: &[(HashValue, StoredNode)]) -> MerkleResult<()>;
}

/// A trait for storing the root of every saved version.
pub trait MerkleRootStore: Send + Sync {
    /// Record the root of a saved version. `None` is an empty tree.
    fn put_root(&self, version: Version, root: Option<&HashValue>) -> MerkleResult<()>;

    /// Root of a saved version. The outer `Option` is whether the version exists.
    fn get_root(&self, version: Version) -> MerkleResult<Option<Option<HashValue>>>;

    /// All saved versions, ascending.
    fn list_versions(&self) -> MerkleResult<Vec<Version>>;

    /// Drop the root records of every version above `version`, returning the
    /// dropped versions. Nodes stay; they are addressed by hash.
    fn delete_roots_after(&self, version: Version) -> MerkleResult<Vec<Version>>;

    /// The highest saved version, if any.
    fn latest_version(&self) -> MerkleResult<Option<Version>> {
        Ok(self.list_versions()?.last().copied())
    }
}

/// Combined storage interface for the tree.
pub trait MerkleStore: MerkleNodeStore + MerkleRootStore {
    /// Flush pending writes to persistent storage.
    fn flush(&self) -> MerkleResult<()>;
}

/// An in-memory implementation of MerkleStore, for tests and ephemeral trees.
#[derive(Clone, Default)]
pub struct InMemoryMerkleStore {
    nodes: Arc<RwLock<HashMap<HashValue, StoredNode>>>,
    roots: Arc<RwLock<BTreeMap<Version, Option<HashValue>>>>,
}

impl InMemoryMerkleStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }
}

impl MerkleNodeStore for InMemoryMerkleStore {
    fn put_node(&self, hash: &HashValue, node: &StoredNode) -> MerkleResult<()> {
        self.nodes.write().insert(*hash, node.clone());
        Ok(())
    }

    fn get_node(&self, hash: &HashValue) -> MerkleResult<Option<StoredNode>> {
        Ok(self.nodes.read().get(hash).cloned())
    }

    fn has_node(&self, hash: &HashValue) -> MerkleResult<bool> {
        Ok(self.nodes.read().contains_key(hash))
    }

    fn batch_put_nodes(&self, nodes: &[(HashValue, StoredNode)]) -> MerkleResult<()> {
        let mut store = self.nodes.write();
        for (hash, node) in nodes {
            store.insert(*hash, node.clone());
        }
        Ok(())
    }
}

impl MerkleRootStore for InMemoryMerkleStore {
    fn put_root(&self, version: Version, root: Option<&HashValue>) -> MerkleResult<()> {
        self.roots.write().insert(version, root.copied());
        Ok(())
    }

    fn get_root(&self, version: Version) -> MerkleResult<Option<Option<HashValue>>> {
        Ok(self.roots.read().get(&version).copied())
    }

    fn list_versions(&self) -> MerkleResult<Vec<Version>> {
        Ok(self.roots.read().keys().copied().collect())
    }

    fn delete_roots_after(&self, version: Version) -> MerkleResult<Vec<Version>> {
        let mut roots = self.roots.write();
        let dropped = roots.split_off(&(version + 1));
        Ok(dropped.into_keys().collect())
    }
}

impl MerkleStore for InMemoryMerkleStore {
    fn flush(&self) -> MerkleResult<()> {
        // No-op for in-memory store
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_hash(byte: u8) -> HashValue {
        HashValue::new([byte; 32])
    }

    fn make_leaf_node(byte: u8) -> StoredNode {
        StoredNode {
            key: vec![byte],
            version: 1,
            height: 0,
            size: 1,
            value: Some(vec![byte + 100]),
            left: None,
            right: None,
        }
    }

    #[test]
    fn test_in_memory_node_store() {
        let store = InMemoryMerkleStore::new();
        let hash = make_hash(1);
        let node = make_leaf_node(1);

        assert!(!store.has_node(&hash).unwrap());
        assert!(store.get_node(&hash).unwrap().is_none());

        store.put_node(&hash, &node).unwrap();
        assert!(store.has_node(&hash).unwrap());
        assert_eq!(store.get_node(&hash).unwrap(), Some(node));
    }

    #[test]
    fn test_in_memory_batch_put() {
        let store = InMemoryMerkleStore::new();

        let nodes: Vec<(HashValue, StoredNode)> = (1..5)
            .map(|i| (make_hash(i), make_leaf_node(i)))
            .collect();

        store.batch_put_nodes(&nodes).unwrap();

        assert_eq!(store.node_count(), 4);
        for (hash, node) in &nodes {
            assert_eq!(store.get_node(hash).unwrap(), Some(node.clone()));
        }
    }

    #[test]
    fn test_in_memory_root_store() {
        let store = InMemoryMerkleStore::new();
        assert_eq!(store.latest_version().unwrap(), None);

        store.put_root(1, None).unwrap();
        store.put_root(3, Some(&make_hash(30))).unwrap();
        store.put_root(2, Some(&make_hash(20))).unwrap();

        assert_eq!(store.get_root(1).unwrap(), Some(None));
        assert_eq!(store.get_root(2).unwrap(), Some(Some(make_hash(20))));
        assert_eq!(store.get_root(9).unwrap(), None);
        assert_eq!(store.list_versions().unwrap(), vec![1, 2, 3]);
        assert_eq!(store.latest_version().unwrap(), Some(3));
    }

    #[test]
    fn test_in_memory_delete_roots_after() {
        let store = InMemoryMerkleStore::new();
        for version in 1..=4 {
            store.put_root(version, Some(&make_hash(version as u8))).unwrap();
        }

        assert_eq!(store.delete_roots_after(2).unwrap(), vec![3, 4]);
        assert_eq!(store.list_versions().unwrap(), vec![1, 2]);
        assert!(store.delete_roots_after(2).unwrap().is_empty());
        assert_eq!(store.delete_roots_after(0).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_flush() {
        let store = InMemoryMerkleStore::new();
        assert!(store.flush().is_ok());
    }
}
