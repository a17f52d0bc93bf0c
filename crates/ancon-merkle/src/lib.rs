//! # ancon-merkle
//!
//! A versioned, Merkle-ized AVL tree with ICS23 existence proofs.
//!
//! - [`tree::MutableTree`] holds the single working tree and its saved
//!   versions; [`tree::ImmutableTree`] is a read-only snapshot of one version.
//! - [`proof::KeyProof`] is the native root-to-leaf path proof for one key.
//! - [`ics23`] converts a `KeyProof` into an ICS23 `ExistenceProof` and
//!   verifies it under the IAVL proof spec.
//!
//! ## Hashing
//!
//! Node hashes follow the IAVL encoding (see [`node`]): heights, sizes and
//! versions as signed varints, keys and child hashes length-prefixed, and
//! leaf values pre-hashed with SHA-256. An empty tree hashes to SHA-256 of
//! the empty string.
//!
//! ## Storage
//!
//! The [`storage`] module defines the node and root store traits the tree
//! persists through. An in-memory implementation is provided here; the
//! `ancon-storage` crate implements them on RocksDB.

pub mod encoding;
pub mod error;
pub mod hash;
pub mod ics23;
pub mod node;
pub mod proof;
pub mod storage;
pub mod tree;
pub mod varint;

pub use error::{MerkleError, MerkleResult};
pub use hash::{empty_hash, sha256, HashValue};
pub use ics23::{
    convert_existence_proof, create_membership_proof, verify_membership, CommitmentProof,
    ExistenceProof, ProofSpec,
};
pub use node::StoredNode;
pub use proof::{KeyProof, PathToLeaf, ProofInnerNode, ProofLeafNode};
pub use storage::{InMemoryMerkleStore, MerkleNodeStore, MerkleRootStore, MerkleStore, Version};
pub use tree::{ImmutableTree, MutableTree};

/// The length of hash digests used in merkle trees (32 bytes = 256 bits)
pub const HASH_LENGTH: usize = 32;
