//! Immutable AVL tree nodes.
//!
//! Nodes are never modified after construction: every mutation builds new
//! nodes along the path to the root and shares the untouched subtrees with
//! the previous version through `Arc`. Each node's hash is computed once in
//! its constructor from its own fields and its children's hashes.
//!
//! # Hash encoding
//!
//! ```text
//! leaf:  SHA256( varint(0) ‖ varint(1) ‖ varint(version)
//!                ‖ uvarint(len key) ‖ key ‖ uvarint(32) ‖ SHA256(value) )
//! inner: SHA256( varint(height) ‖ varint(size) ‖ varint(version)
//!                ‖ uvarint(32) ‖ left_hash ‖ uvarint(32) ‖ right_hash )
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hash::{sha256, HashValue};
use crate::varint::{encode_varint, write_length_prefixed};

/// Hash of a leaf from its key, the SHA-256 of its value and its version.
pub fn hash_leaf(key: &[u8], value_hash: &HashValue, version: i64) -> HashValue {
    let mut buf = Vec::with_capacity(key.len() + 48);
    buf.extend_from_slice(&encode_varint(0));
    buf.extend_from_slice(&encode_varint(1));
    buf.extend_from_slice(&encode_varint(version));
    write_length_prefixed(&mut buf, key);
    write_length_prefixed(&mut buf, value_hash.as_bytes());
    sha256(&buf)
}

/// Hash of an inner node from its metadata and both child hashes.
pub fn hash_inner(
    height: u8,
    size: u64,
    version: i64,
    left: &HashValue,
    right: &HashValue,
) -> HashValue {
    let mut buf = Vec::with_capacity(80);
    buf.extend_from_slice(&encode_varint(i64::from(height)));
    buf.extend_from_slice(&encode_varint(size as i64));
    buf.extend_from_slice(&encode_varint(version));
    write_length_prefixed(&mut buf, left.as_bytes());
    write_length_prefixed(&mut buf, right.as_bytes());
    sha256(&buf)
}

#[derive(Debug)]
pub enum NodeKind {
    Leaf { value: Vec<u8> },
    Inner { left: Arc<Node>, right: Arc<Node> },
}

/// A node of the versioned AVL tree.
///
/// For a leaf, `key` is the stored key. For an inner node it is the split
/// key: the leftmost key of the right subtree, so lookups go left iff
/// `key < node.key`.
#[derive(Debug)]
pub struct Node {
    key: Vec<u8>,
    version: i64,
    height: u8,
    size: u64,
    hash: HashValue,
    kind: NodeKind,
}

impl Node {
    pub fn new_leaf(key: Vec<u8>, value: Vec<u8>, version: i64) -> Self {
        let hash = hash_leaf(&key, &sha256(&value), version);
        Self {
            key,
            version,
            height: 0,
            size: 1,
            hash,
            kind: NodeKind::Leaf { value },
        }
    }

    pub fn new_inner(key: Vec<u8>, left: Arc<Node>, right: Arc<Node>, version: i64) -> Self {
        let height = left.height.max(right.height) + 1;
        let size = left.size + right.size;
        let hash = hash_inner(height, size, version, &left.hash, &right.hash);
        Self {
            key,
            version,
            height,
            size,
            hash,
            kind: NodeKind::Inner { left, right },
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn hash(&self) -> HashValue {
        self.hash
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Leaf value, `None` for inner nodes.
    pub fn value(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Leaf { value } => Some(value),
            NodeKind::Inner { .. } => None,
        }
    }

    /// Children of an inner node, `None` for leaves.
    pub fn children(&self) -> Option<(&Arc<Node>, &Arc<Node>)> {
        match &self.kind {
            NodeKind::Leaf { .. } => None,
            NodeKind::Inner { left, right } => Some((left, right)),
        }
    }

    /// Height difference between the left and right subtree.
    pub fn balance_factor(&self) -> i16 {
        match &self.kind {
            NodeKind::Leaf { .. } => 0,
            NodeKind::Inner { left, right } => i16::from(left.height) - i16::from(right.height),
        }
    }

    /// Look up `key` in this subtree, returning its rank and value.
    ///
    /// When the key is absent the rank is where it would be inserted.
    pub fn get(&self, key: &[u8]) -> (u64, Option<&[u8]>) {
        match &self.kind {
            NodeKind::Leaf { value } => match key.cmp(&self.key) {
                Ordering::Less => (0, None),
                Ordering::Equal => (0, Some(value)),
                Ordering::Greater => (1, None),
            },
            NodeKind::Inner { left, right } => {
                if key < self.key.as_slice() {
                    left.get(key)
                } else {
                    let (index, value) = right.get(key);
                    (index + left.size, value)
                }
            }
        }
    }

    /// Key and value of the leaf at `index` in sorted order.
    pub fn get_by_index(&self, index: u64) -> Option<(&[u8], &[u8])> {
        match &self.kind {
            NodeKind::Leaf { value } => (index == 0).then_some((self.key.as_slice(), value.as_slice())),
            NodeKind::Inner { left, right } => {
                if index < left.size {
                    left.get_by_index(index)
                } else {
                    right.get_by_index(index - left.size)
                }
            }
        }
    }

    /// In-order walk over leaves with keys in `[start, end)`.
    pub(crate) fn collect_range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        out: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) {
        match &self.kind {
            NodeKind::Leaf { value } => {
                let after_start = start.map_or(true, |s| self.key.as_slice() >= s);
                let before_end = end.map_or(true, |e| self.key.as_slice() < e);
                if after_start && before_end {
                    out.push((self.key.clone(), value.clone()));
                }
            }
            NodeKind::Inner { left, right } => {
                // Left subtree holds keys < self.key, right holds keys >= self.key.
                if start.map_or(true, |s| s < self.key.as_slice()) {
                    left.collect_range(start, end, out);
                }
                if end.map_or(true, |e| e > self.key.as_slice()) {
                    right.collect_range(start, end, out);
                }
            }
        }
    }

    /// Structural invariant check used by tests: AVL balance, sizes,
    /// heights, split keys and strict key order.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Vec<u8> {
        match &self.kind {
            NodeKind::Leaf { .. } => {
                assert_eq!(self.height, 0);
                assert_eq!(self.size, 1);
                self.key.clone()
            }
            NodeKind::Inner { left, right } => {
                assert!(self.balance_factor().abs() <= 1, "unbalanced node");
                assert_eq!(self.size, left.size + right.size);
                assert_eq!(self.height, left.height.max(right.height) + 1);
                let leftmost = left.check_invariants();
                let right_leftmost = right.check_invariants();
                assert_eq!(self.key, right_leftmost, "split key is not leftmost of right subtree");
                let mut left_keys = Vec::new();
                left.collect_range(None, None, &mut left_keys);
                assert!(left_keys.iter().all(|(k, _)| k.as_slice() < self.key.as_slice()));
                assert_eq!(
                    self.hash,
                    hash_inner(self.height, self.size, self.version, &left.hash, &right.hash)
                );
                leftmost
            }
        }
    }
}

/// Flat, serializable form of a node as written to a node store.
///
/// Children are referenced by hash; the store resolves them on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub key: Vec<u8>,
    pub version: i64,
    pub height: u8,
    pub size: u64,
    /// Present for leaves.
    pub value: Option<Vec<u8>>,
    /// Present for inner nodes.
    pub left: Option<HashValue>,
    pub right: Option<HashValue>,
}

impl StoredNode {
    pub fn from_node(node: &Node) -> Self {
        match &node.kind {
            NodeKind::Leaf { value } => Self {
                key: node.key.clone(),
                version: node.version,
                height: 0,
                size: 1,
                value: Some(value.clone()),
                left: None,
                right: None,
            },
            NodeKind::Inner { left, right } => Self {
                key: node.key.clone(),
                version: node.version,
                height: node.height,
                size: node.size,
                value: None,
                left: Some(left.hash),
                right: Some(right.hash),
            },
        }
    }
}
