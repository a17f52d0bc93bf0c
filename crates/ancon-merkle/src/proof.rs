//! Native path-to-leaf proofs.
//!
//! A [`KeyProof`] records the descent from the root to one leaf. Each
//! [`ProofInnerNode`] carries the metadata of an ancestor and the hash of the
//! sibling subtree that was *not* taken, so the ancestor's hash can be
//! recomputed from the hash of the child that was taken alone.
//!
//! The path is stored root-to-leaf, in the order it is captured; replay runs
//! it in reverse.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{MerkleError, MerkleResult};
use crate::hash::{sha256, HashValue};
use crate::node::{hash_inner, hash_leaf, Node, NodeKind};

/// One ancestor on the path to a leaf.
///
/// Exactly one of `left` / `right` is set: the sibling's hash. `left` set
/// means the descent went right.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInnerNode {
    pub height: u8,
    pub size: u64,
    pub version: i64,
    pub left: Option<HashValue>,
    pub right: Option<HashValue>,
}

impl ProofInnerNode {
    /// Combine the hash of the child that was taken with the recorded sibling.
    pub fn hash(&self, child_hash: &HashValue) -> MerkleResult<HashValue> {
        match (&self.left, &self.right) {
            (Some(left), None) => Ok(hash_inner(self.height, self.size, self.version, left, child_hash)),
            (None, Some(right)) => Ok(hash_inner(self.height, self.size, self.version, child_hash, right)),
            _ => Err(MerkleError::InvalidProof(
                "inner node must carry exactly one sibling hash".to_string(),
            )),
        }
    }
}

/// The leaf at the end of a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLeafNode {
    pub key: Vec<u8>,
    pub value_hash: HashValue,
    pub version: i64,
}

impl ProofLeafNode {
    pub fn hash(&self) -> HashValue {
        hash_leaf(&self.key, &self.value_hash, self.version)
    }
}

/// Ancestors of a leaf, root first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathToLeaf(pub Vec<ProofInnerNode>);

impl PathToLeaf {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProofInnerNode> {
        self.0.iter()
    }

    /// Fold the path bottom-up starting from `leaf_hash`.
    pub fn compute_root(&self, leaf_hash: HashValue) -> MerkleResult<HashValue> {
        self.0
            .iter()
            .rev()
            .try_fold(leaf_hash, |current, inner| inner.hash(&current))
    }
}

/// Proof that one key is stored under a root.
///
/// `leaves` is a list so the shape matches range proofs; the builder always
/// emits exactly one leaf, and the ICS23 converter rejects anything else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyProof {
    pub left_path: PathToLeaf,
    pub leaves: Vec<ProofLeafNode>,
}

impl KeyProof {
    /// The single leaf of the proof.
    pub fn leaf(&self) -> MerkleResult<&ProofLeafNode> {
        match self.leaves.as_slice() {
            [leaf] => Ok(leaf),
            other => Err(MerkleError::UnsupportedProofShape {
                leaves: other.len(),
            }),
        }
    }

    /// Replay the path from the leaf up to the root.
    pub fn compute_root_hash(&self) -> MerkleResult<HashValue> {
        self.left_path.compute_root(self.leaf()?.hash())
    }

    /// Check the proof against a trusted root.
    pub fn verify(&self, root: &HashValue) -> MerkleResult<()> {
        let computed = self.compute_root_hash()?;
        if &computed == root {
            Ok(())
        } else {
            Err(MerkleError::InvalidProof(format!(
                "Root mismatch: expected {}, computed {}",
                root, computed
            )))
        }
    }

    /// Check the proof and that it proves exactly `key` = `value`.
    pub fn verify_item(&self, root: &HashValue, key: &[u8], value: &[u8]) -> MerkleResult<()> {
        let leaf = self.leaf()?;
        if leaf.key != key {
            return Err(MerkleError::InvalidProof(format!(
                "Leaf key mismatch: expected {}, got {}",
                hex::encode(key),
                hex::encode(&leaf.key)
            )));
        }
        if leaf.value_hash != sha256(value) {
            return Err(MerkleError::InvalidProof("Value hash mismatch".to_string()));
        }
        self.verify(root)
    }
}

/// Descend from `root` to the leaf holding `key`, recording siblings.
pub(crate) fn build_path(root: &Arc<Node>, key: &[u8]) -> MerkleResult<(Vec<u8>, KeyProof)> {
    let mut path = Vec::with_capacity(usize::from(root.height()));
    let mut node = root;

    loop {
        match node.kind() {
            NodeKind::Inner { left, right } => {
                if key < node.key() {
                    path.push(ProofInnerNode {
                        height: node.height(),
                        size: node.size(),
                        version: node.version(),
                        left: None,
                        right: Some(right.hash()),
                    });
                    node = left;
                } else {
                    path.push(ProofInnerNode {
                        height: node.height(),
                        size: node.size(),
                        version: node.version(),
                        left: Some(left.hash()),
                        right: None,
                    });
                    node = right;
                }
            }
            NodeKind::Leaf { value } => {
                if node.key() != key {
                    return Err(MerkleError::key_not_found(key));
                }
                let leaf = ProofLeafNode {
                    key: key.to_vec(),
                    value_hash: sha256(value),
                    version: node.version(),
                };
                let proof = KeyProof {
                    left_path: PathToLeaf(path),
                    leaves: vec![leaf],
                };
                return Ok((value.clone(), proof));
            }
        }
    }
}
