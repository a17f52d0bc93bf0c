//! ICS23 commitment proofs.
//!
//! Converts a native [`KeyProof`] into the ICS23 `ExistenceProof` layout used
//! for IAVL trees, and verifies such proofs against a root under
//! [`ProofSpec::iavl`]. The encodings here are bit-exact with the node
//! hashing in [`crate::node`]: the leaf op prefix carries the leaf's
//! metadata, and each inner op carries the ancestor's metadata with the
//! sibling hash placed in the prefix (sibling on the left) or the suffix
//! (sibling on the right).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::encoding::base64_bytes;
use crate::error::{MerkleError, MerkleResult};
use crate::hash::HashValue;
use crate::proof::KeyProof;
use crate::varint::{encode_uvarint, encode_varint, HASH_LENGTH_PREFIX};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashOp {
    NoHash,
    Sha256,
}

impl HashOp {
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashOp::NoHash => data.to_vec(),
            HashOp::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LengthOp {
    NoPrefix,
    VarProto,
}

impl LengthOp {
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        match self {
            LengthOp::NoPrefix => data.to_vec(),
            LengthOp::VarProto => {
                let mut out = encode_uvarint(data.len() as u64);
                out.extend_from_slice(data);
                out
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafOp {
    pub hash: HashOp,
    pub prehash_key: HashOp,
    pub prehash_value: HashOp,
    pub length: LengthOp,
    #[serde(with = "base64_bytes")]
    pub prefix: Vec<u8>,
}

impl LeafOp {
    /// `hash(prefix ‖ length(prehash_key(key)) ‖ length(prehash_value(value)))`
    pub fn apply(&self, key: &[u8], value: &[u8]) -> MerkleResult<Vec<u8>> {
        if key.is_empty() {
            return Err(MerkleError::InvalidProof("leaf op needs a key".to_string()));
        }
        if value.is_empty() {
            return Err(MerkleError::InvalidProof("leaf op needs a value".to_string()));
        }
        let mut data = self.prefix.clone();
        data.extend(self.length.apply(&self.prehash_key.apply(key)));
        data.extend(self.length.apply(&self.prehash_value.apply(value)));
        Ok(self.hash.apply(&data))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerOp {
    pub hash: HashOp,
    #[serde(with = "base64_bytes")]
    pub prefix: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub suffix: Vec<u8>,
}

impl InnerOp {
    /// `hash(prefix ‖ child ‖ suffix)`
    pub fn apply(&self, child: &[u8]) -> MerkleResult<Vec<u8>> {
        if child.is_empty() {
            return Err(MerkleError::InvalidProof("inner op needs a child hash".to_string()));
        }
        let mut data = Vec::with_capacity(self.prefix.len() + child.len() + self.suffix.len());
        data.extend_from_slice(&self.prefix);
        data.extend_from_slice(child);
        data.extend_from_slice(&self.suffix);
        Ok(self.hash.apply(&data))
    }
}

/// Proof that `key` maps to `value` under some root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceProof {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub leaf: LeafOp,
    /// Leaf to root.
    pub path: Vec<InnerOp>,
}

impl ExistenceProof {
    /// Root hash implied by this proof.
    pub fn calculate(&self) -> MerkleResult<HashValue> {
        let leaf = self.leaf.apply(&self.key, &self.value)?;
        let root = self
            .path
            .iter()
            .try_fold(leaf, |current, op| op.apply(&current))?;
        HashValue::from_slice(&root)
    }
}

/// Absence proof, bracketed by the neighbours of the missing key.
///
/// Kept for format completeness; this crate never produces one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonExistenceProof {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    pub left: Option<ExistenceProof>,
    pub right: Option<ExistenceProof>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentProof {
    Exist(ExistenceProof),
    Nonexist(NonExistenceProof),
}

impl CommitmentProof {
    pub fn as_existence(&self) -> Option<&ExistenceProof> {
        match self {
            CommitmentProof::Exist(proof) => Some(proof),
            CommitmentProof::Nonexist(_) => None,
        }
    }

    /// JSON bytes, as carried in the `membershipproof` response field.
    pub fn to_json_bytes(&self) -> MerkleResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MerkleError::SerializationError(e.to_string()))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> MerkleResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| MerkleError::SerializationError(e.to_string()))
    }
}

/// Expected shape of the leaf ops of a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafSpec {
    pub hash: HashOp,
    pub prehash_key: HashOp,
    pub prehash_value: HashOp,
    pub length: LengthOp,
    pub prefix: Vec<u8>,
}

/// Expected shape of the inner ops of a binary tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InnerSpec {
    pub child_size: usize,
    pub min_prefix_length: usize,
    pub max_prefix_length: usize,
    pub hash: HashOp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofSpec {
    pub leaf_spec: LeafSpec,
    pub inner_spec: InnerSpec,
}

impl ProofSpec {
    /// The IAVL proof spec.
    pub fn iavl() -> Self {
        Self {
            leaf_spec: LeafSpec {
                hash: HashOp::Sha256,
                prehash_key: HashOp::NoHash,
                prehash_value: HashOp::Sha256,
                length: LengthOp::VarProto,
                prefix: vec![0x00],
            },
            inner_spec: InnerSpec {
                child_size: 33,
                min_prefix_length: 4,
                max_prefix_length: 12,
                hash: HashOp::Sha256,
            },
        }
    }

    fn check_leaf(&self, leaf: &LeafOp) -> MerkleResult<()> {
        let spec = &self.leaf_spec;
        if leaf.hash != spec.hash
            || leaf.prehash_key != spec.prehash_key
            || leaf.prehash_value != spec.prehash_value
            || leaf.length != spec.length
        {
            return Err(MerkleError::InvalidProof(format!("unexpected leaf op: {:?}", leaf)));
        }
        if !leaf.prefix.starts_with(&spec.prefix) {
            return Err(MerkleError::InvalidProof("leaf prefix mismatch".to_string()));
        }
        Ok(())
    }

    fn check_inner(&self, inner: &InnerOp) -> MerkleResult<()> {
        let spec = &self.inner_spec;
        if inner.hash != spec.hash {
            return Err(MerkleError::InvalidProof(format!(
                "unexpected inner hash op: {:?}",
                inner.hash
            )));
        }
        if inner.prefix.starts_with(&self.leaf_spec.prefix) {
            return Err(MerkleError::InvalidProof("inner prefix starts with leaf prefix".to_string()));
        }
        // Binary tree: at most one sibling in the prefix.
        let max_prefix = spec.max_prefix_length + spec.child_size;
        if inner.prefix.len() < spec.min_prefix_length || inner.prefix.len() > max_prefix {
            return Err(MerkleError::InvalidProof(format!(
                "inner prefix length {} outside [{}, {}]",
                inner.prefix.len(),
                spec.min_prefix_length,
                max_prefix
            )));
        }
        if inner.suffix.len() % spec.child_size != 0 || inner.suffix.len() > spec.child_size {
            return Err(MerkleError::InvalidProof(format!(
                "inner suffix length {} is not a single child",
                inner.suffix.len()
            )));
        }
        Ok(())
    }
}

/// Convert a single-leaf native proof into an ICS23 existence proof.
pub fn convert_existence_proof(
    proof: &KeyProof,
    key: &[u8],
    value: &[u8],
) -> MerkleResult<ExistenceProof> {
    let leaf = proof.leaf()?;

    let mut leaf_prefix = encode_varint(0);
    leaf_prefix.extend(encode_varint(1));
    leaf_prefix.extend(encode_varint(leaf.version));

    let path = proof
        .left_path
        .iter()
        .rev()
        .map(|inner| {
            let mut prefix = encode_varint(i64::from(inner.height));
            prefix.extend(encode_varint(inner.size as i64));
            prefix.extend(encode_varint(inner.version));

            let mut suffix = Vec::new();
            match (&inner.left, &inner.right) {
                (Some(left), _) => {
                    prefix.push(HASH_LENGTH_PREFIX);
                    prefix.extend_from_slice(left.as_bytes());
                    prefix.push(HASH_LENGTH_PREFIX);
                }
                (None, Some(right)) => {
                    prefix.push(HASH_LENGTH_PREFIX);
                    suffix.push(HASH_LENGTH_PREFIX);
                    suffix.extend_from_slice(right.as_bytes());
                }
                (None, None) => {
                    return Err(MerkleError::InvalidProof(
                        "inner node carries no sibling hash".to_string(),
                    ))
                }
            }

            Ok(InnerOp {
                hash: HashOp::Sha256,
                prefix,
                suffix,
            })
        })
        .collect::<MerkleResult<Vec<_>>>()?;

    Ok(ExistenceProof {
        key: key.to_vec(),
        value: value.to_vec(),
        leaf: LeafOp {
            hash: HashOp::Sha256,
            prehash_key: HashOp::NoHash,
            prehash_value: HashOp::Sha256,
            length: LengthOp::VarProto,
            prefix: leaf_prefix,
        },
        path,
    })
}

pub fn create_membership_proof(proof: ExistenceProof) -> CommitmentProof {
    CommitmentProof::Exist(proof)
}

/// Verify that `proof` shows `key` = `value` under `root`.
pub fn verify_membership(
    spec: &ProofSpec,
    root: &HashValue,
    proof: &CommitmentProof,
    key: &[u8],
    value: &[u8],
) -> MerkleResult<()> {
    let exist = proof
        .as_existence()
        .ok_or_else(|| MerkleError::InvalidProof("expected an existence proof".to_string()))?;

    if exist.key != key {
        return Err(MerkleError::InvalidProof(format!(
            "Provided key {} does not match proof key {}",
            hex::encode(key),
            hex::encode(&exist.key)
        )));
    }
    if exist.value != value {
        return Err(MerkleError::InvalidProof(
            "Provided value does not match proof value".to_string(),
        ));
    }

    spec.check_leaf(&exist.leaf)?;
    for inner in &exist.path {
        spec.check_inner(inner)?;
    }

    let computed = exist.calculate()?;
    if &computed != root {
        return Err(MerkleError::InvalidProof(format!(
            "Root mismatch: expected {}, computed {}",
            root, computed
        )));
    }
    Ok(())
}
