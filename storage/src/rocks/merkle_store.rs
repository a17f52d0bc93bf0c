//! RocksDB implementation of `MerkleStore` for persistent tree storage.
//!
//! # Column Family Layout
//!
//! - `merkle_nodes`: tree nodes
//!   - Key: `NodeKey { node_hash }` (bincode)
//!   - Value: `StoredNode` (BCS)
//!
//! - `merkle_roots`: one record per saved version
//!   - Key: `b'r' ‖ version (big-endian i64)`, raw so keys sort by version
//!   - Value: `Option<[u8; 32]>` (BCS), `None` for an empty tree
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ancon_storage::RocksDBMerkleStore;
//! use ancon_merkle::MutableTree;
//!
//! let store = Arc::new(RocksDBMerkleStore::open("/path/to/db")?);
//! let mut tree = MutableTree::load(store, 0)?;
//! tree.set(b"key", b"value")?;
//! tree.save_version()?;
//! ```

use std::path::Path;

use ancon_merkle::error::{MerkleError, MerkleResult};
use ancon_merkle::storage::{MerkleNodeStore, MerkleRootStore, MerkleStore, Version};
use ancon_merkle::{HashValue, StoredNode};
use tracing::debug;

use crate::rocks::core::{
    AnconDB, ColumnFamily, IntoMerkleResult, StorageError, StorageOperation, StorageResultExt,
};

/// Key for storing tree nodes by hash
#[derive(Clone, Debug, bincode::Encode, bincode::Decode)]
struct NodeKey {
    node_hash: [u8; 32],
}

impl NodeKey {
    fn new(hash: &HashValue) -> Self {
        Self {
            node_hash: *hash.as_bytes(),
        }
    }
}

const ROOT_KEY_PREFIX: u8 = b'r';

fn root_key(version: Version) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = ROOT_KEY_PREFIX;
    key[1..].copy_from_slice(&version.to_be_bytes());
    key
}

fn version_from_root_key(key: &[u8]) -> Result<Version, StorageError> {
    match key {
        [ROOT_KEY_PREFIX, rest @ ..] if rest.len() == 8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(rest);
            Ok(Version::from_be_bytes(bytes))
        }
        _ => Err(StorageError::invalid_data(format!(
            "malformed root key {}",
            hex::encode(key)
        ))
        .with_cf(ColumnFamily::MerkleRoots.name())),
    }
}

/// RocksDB-backed implementation of MerkleStore.
pub struct RocksDBMerkleStore {
    db: AnconDB,
}

impl RocksDBMerkleStore {
    /// Create a new RocksDB merkle store from an existing database handle.
    pub fn new(db: AnconDB) -> Self {
        Self { db }
    }

    /// Open a database at the given path with default tuning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = AnconDB::open_default(path).with_operation(StorageOperation::Open)?;
        Ok(Self::new(db))
    }
}

impl MerkleNodeStore for RocksDBMerkleStore {
    fn put_node(&self, hash: &HashValue, node: &StoredNode) -> MerkleResult<()> {
        self.db
            .put(ColumnFamily::MerkleNodes, &NodeKey::new(hash), node)
            .with_context(StorageOperation::Put, ColumnFamily::MerkleNodes.name(), hash.as_bytes())
            .into_merkle_result()
    }

    fn get_node(&self, hash: &HashValue) -> MerkleResult<Option<StoredNode>> {
        self.db
            .get(ColumnFamily::MerkleNodes, &NodeKey::new(hash))
            .with_context(StorageOperation::Get, ColumnFamily::MerkleNodes.name(), hash.as_bytes())
            .into_merkle_result()
    }

    fn has_node(&self, hash: &HashValue) -> MerkleResult<bool> {
        self.db
            .exists(ColumnFamily::MerkleNodes, &NodeKey::new(hash))
            .with_context(StorageOperation::Get, ColumnFamily::MerkleNodes.name(), hash.as_bytes())
            .into_merkle_result()
    }

    fn batch_put_nodes(&self, nodes: &[(HashValue, StoredNode)]) -> MerkleResult<()> {
        let mut batch = self.db.batch();
        for (hash, node) in nodes {
            self.db
                .batch_put(&mut batch, ColumnFamily::MerkleNodes, &NodeKey::new(hash), node)
                .into_merkle_result()?;
        }
        self.db
            .write_batch(batch)
            .with_operation(StorageOperation::BatchWrite)
            .with_cf(ColumnFamily::MerkleNodes.name())
            .into_merkle_result()?;
        debug!(nodes = nodes.len(), "Wrote merkle node batch");
        Ok(())
    }
}

impl MerkleRootStore for RocksDBMerkleStore {
    fn put_root(&self, version: Version, root: Option<&HashValue>) -> MerkleResult<()> {
        if version <= 0 {
            return Err(MerkleError::InvalidArgument(format!(
                "versions start at 1, got {}",
                version
            )));
        }
        let key = root_key(version);
        let value: Option<[u8; 32]> = root.map(|hash| *hash.as_bytes());
        self.db
            .put_raw(ColumnFamily::MerkleRoots, &key, &value)
            .with_context(StorageOperation::Put, ColumnFamily::MerkleRoots.name(), &key)
            .into_merkle_result()
    }

    fn get_root(&self, version: Version) -> MerkleResult<Option<Option<HashValue>>> {
        let key = root_key(version);
        let record: Option<Option<[u8; 32]>> = self
            .db
            .get_raw(ColumnFamily::MerkleRoots, &key)
            .with_context(StorageOperation::Get, ColumnFamily::MerkleRoots.name(), &key)
            .into_merkle_result()?;
        Ok(record.map(|root| root.map(HashValue::new)))
    }

    fn list_versions(&self) -> MerkleResult<Vec<Version>> {
        self.db
            .prefix_scan_keys(ColumnFamily::MerkleRoots, &[ROOT_KEY_PREFIX])
            .with_operation(StorageOperation::Iterate)
            .into_merkle_result()?
            .iter()
            .map(|key| version_from_root_key(key).into_merkle_result())
            .collect()
    }

    fn delete_roots_after(&self, version: Version) -> MerkleResult<Vec<Version>> {
        let doomed: Vec<Version> = self
            .list_versions()?
            .into_iter()
            .filter(|v| *v > version)
            .collect();
        if doomed.is_empty() {
            return Ok(doomed);
        }

        let mut batch = self.db.batch();
        for v in &doomed {
            self.db
                .batch_delete_raw(&mut batch, ColumnFamily::MerkleRoots, &root_key(*v))
                .into_merkle_result()?;
        }
        self.db
            .write_batch(batch)
            .with_operation(StorageOperation::BatchWrite)
            .with_cf(ColumnFamily::MerkleRoots.name())
            .into_merkle_result()?;
        debug!(after = version, deleted = doomed.len(), "Deleted root records");
        Ok(doomed)
    }
}

impl MerkleStore for RocksDBMerkleStore {
    fn flush(&self) -> MerkleResult<()> {
        self.db
            .flush()
            .with_operation(StorageOperation::Flush)
            .into_merkle_result()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use ancon_merkle::MutableTree;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksDBMerkleStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksDBMerkleStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn test_hash(byte: u8) -> HashValue {
        HashValue::new([byte; 32])
    }

    fn test_leaf(byte: u8) -> StoredNode {
        StoredNode {
            key: vec![byte],
            version: 1,
            height: 0,
            size: 1,
            value: Some(vec![byte, byte]),
            left: None,
            right: None,
        }
    }

    #[test]
    fn test_put_get_node() {
        let (store, _temp_dir) = create_test_store();
        let hash = test_hash(1);
        let node = test_leaf(1);

        assert!(!store.has_node(&hash).unwrap());
        store.put_node(&hash, &node).unwrap();

        assert!(store.has_node(&hash).unwrap());
        assert_eq!(store.get_node(&hash).unwrap(), Some(node));
        assert_eq!(store.get_node(&test_hash(2)).unwrap(), None);
    }

    #[test]
    fn test_batch_put_nodes() {
        let (store, _temp_dir) = create_test_store();

        let nodes: Vec<(HashValue, StoredNode)> = (0..5)
            .map(|i| (test_hash(i), test_leaf(i)))
            .collect();

        store.batch_put_nodes(&nodes).unwrap();

        for (hash, node) in &nodes {
            assert_eq!(store.get_node(hash).unwrap().as_ref(), Some(node));
        }
    }

    #[test]
    fn test_roots_listed_in_version_order() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.latest_version().unwrap(), None);

        // 256 sorts before 3 under a little-endian or varint encoding
        for version in [3, 1, 256, 2] {
            store.put_root(version, Some(&test_hash(version as u8))).unwrap();
        }
        store.put_root(4, None).unwrap();

        assert_eq!(store.list_versions().unwrap(), vec![1, 2, 3, 4, 256]);
        assert_eq!(store.latest_version().unwrap(), Some(256));
        assert_eq!(store.get_root(2).unwrap(), Some(Some(test_hash(2))));
        assert_eq!(store.get_root(4).unwrap(), Some(None));
        assert_eq!(store.get_root(5).unwrap(), None);
    }

    #[test]
    fn test_rejects_non_positive_version() {
        let (store, _temp_dir) = create_test_store();
        assert!(matches!(
            store.put_root(0, None),
            Err(MerkleError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_delete_roots_after() {
        let (store, _temp_dir) = create_test_store();
        for version in 1..=4 {
            store.put_root(version, Some(&test_hash(version as u8))).unwrap();
        }

        assert_eq!(store.delete_roots_after(2).unwrap(), vec![3, 4]);
        assert_eq!(store.list_versions().unwrap(), vec![1, 2]);
        assert_eq!(store.get_root(3).unwrap(), None);
        assert_eq!(store.get_root(2).unwrap(), Some(Some(test_hash(2))));
        assert!(store.delete_roots_after(2).unwrap().is_empty());
    }

    #[test]
    fn test_root_key_layout() {
        assert_eq!(root_key(1), [b'r', 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(version_from_root_key(&root_key(1234)).unwrap(), 1234);
        assert!(version_from_root_key(b"r12").is_err());
    }

    #[test]
    fn test_tree_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let (v1, v2) = {
            let store = Arc::new(RocksDBMerkleStore::open(temp_dir.path()).unwrap());
            let mut tree = MutableTree::with_store(store);
            for (k, v) in [("a", "1"), ("b", "2"), ("c", "3")] {
                tree.set(k.as_bytes(), v.as_bytes()).unwrap();
            }
            let (v1, _) = tree.save_version().unwrap();
            tree.set(b"b", b"22").unwrap();
            tree.remove(b"a").unwrap();
            let (v2, _) = tree.save_version().unwrap();
            (v1, v2)
        };

        let store = Arc::new(RocksDBMerkleStore::open(temp_dir.path()).unwrap());
        let tree = MutableTree::load(store, 0).unwrap();
        assert_eq!(tree.version(), 2);
        assert_eq!(tree.hash(), v2);
        assert_eq!(tree.get_immutable(1).unwrap().hash(), v1);
        assert_eq!(tree.get(b"b"), Some((0, b"22".to_vec())));
        assert_eq!(tree.get_versioned(1, b"a").unwrap(), Some((0, b"1".to_vec())));
    }
}
