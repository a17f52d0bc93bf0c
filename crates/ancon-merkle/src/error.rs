//! Error types for merkle tree operations.

use thiserror::Error;

/// Result type for merkle operations
pub type MerkleResult<T> = Result<T, MerkleError>;

/// Errors that can occur during merkle tree operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// The requested version was never saved (or is not loaded)
    #[error("Version does not exist: {version}")]
    VersionNotFound { version: i64 },

    /// Key not found in the tree
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// Index out of bounds
    #[error("Index out of bounds: {index} >= {size}")]
    IndexOutOfBounds { index: u64, size: u64 },

    /// Invalid input, rejected before the tree is touched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Existence proofs can only be built from a single-leaf proof
    #[error("Unsupported proof shape: existence proof requires exactly one leaf, got {leaves}")]
    UnsupportedProofShape { leaves: usize },

    /// The provided proof is invalid
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// A different root is already persisted under this version
    #[error("Version {version} already exists with a different root")]
    VersionConflict { version: i64 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl MerkleError {
    /// Build a `KeyNotFound` error, rendering the key as hex.
    pub fn key_not_found(key: &[u8]) -> Self {
        Self::KeyNotFound {
            key: hex::encode(key),
        }
    }

    /// Check if this is a missing-key error
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }

    /// Check if this is a missing-version error
    pub fn is_version_not_found(&self) -> bool {
        matches!(self, Self::VersionNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_renders_hex() {
        let err = MerkleError::key_not_found(b"ab");
        assert_eq!(err.to_string(), "Key not found: 6162");
        assert!(err.is_key_not_found());
        assert!(!err.is_version_not_found());
    }

    #[test]
    fn test_not_found_classes_are_distinct() {
        let err = MerkleError::VersionNotFound { version: 999 };
        assert!(err.is_version_not_found());
        assert!(!err.is_key_not_found());
        assert_eq!(err.to_string(), "Version does not exist: 999");
    }
}
