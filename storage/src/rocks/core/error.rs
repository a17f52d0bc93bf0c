//! Storage error types carrying the context of the failed access.
//!
//! A [`StorageError`] records what went wrong ([`StorageErrorKind`]) plus,
//! when known, the operation, column family and key involved:
//!
//! ```ignore
//! let err = StorageError::rocksdb(rocks_err)
//!     .with_operation(StorageOperation::Get)
//!     .with_cf("merkle_nodes")
//!     .with_key_bytes(hash.as_bytes());
//! ```

use thiserror::Error;
use std::fmt;

use ancon_merkle::MerkleError;

/// Longest key rendered in error messages.
const MAX_KEY_DISPLAY: usize = 64;

/// The storage operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Open,
    Get,
    Put,
    BatchWrite,
    Iterate,
    Flush,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageOperation::Open => "open",
            StorageOperation::Get => "get",
            StorageOperation::Put => "put",
            StorageOperation::BatchWrite => "batch_write",
            StorageOperation::Iterate => "iterate",
            StorageOperation::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// The underlying cause of a storage error
#[derive(Error, Debug)]
pub enum StorageErrorKind {
    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// A record decoded but does not make sense (e.g. a malformed root key)
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage error with optional operation / column family / key context
#[derive(Debug)]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub operation: Option<StorageOperation>,
    pub key: Option<String>,
    pub column_family: Option<String>,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            operation: None,
            key: None,
            column_family: None,
        }
    }

    pub fn rocksdb(err: rocksdb::Error) -> Self {
        Self::new(StorageErrorKind::RocksDB(err))
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Serialization(msg.into()))
    }

    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Deserialization(msg.into()))
    }

    pub fn cf_not_found(cf_name: impl Into<String>) -> Self {
        let name = cf_name.into();
        Self::new(StorageErrorKind::ColumnFamilyNotFound(name.clone())).with_cf(name)
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::InvalidData(msg.into()))
    }

    pub fn with_operation(mut self, op: StorageOperation) -> Self {
        self.operation = Some(op);
        self
    }

    /// Attach a binary key, rendered as hex and truncated for display.
    pub fn with_key_bytes(mut self, key: &[u8]) -> Self {
        let mut rendered = hex::encode(key);
        if rendered.len() > MAX_KEY_DISPLAY {
            rendered.truncate(MAX_KEY_DISPLAY - 3);
            rendered.push_str("...");
        }
        self.key = Some(rendered);
        self
    }

    pub fn with_cf(mut self, cf: impl Into<String>) -> Self {
        self.column_family = Some(cf.into());
        self
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut context = Vec::new();
        if let Some(op) = &self.operation {
            context.push(format!("op={}", op));
        }
        if let Some(cf) = &self.column_family {
            context.push(format!("cf={}", cf));
        }
        if let Some(key) = &self.key {
            context.push(format!("key={}", key));
        }

        if context.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} [{}]", self.kind, context.join(", "))
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            StorageErrorKind::RocksDB(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        Self::rocksdb(e)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Adds context to the error side of a storage result
pub trait StorageResultExt<T> {
    fn with_operation(self, op: StorageOperation) -> Result<T>;

    fn with_cf(self, cf: impl Into<String>) -> Result<T>;

    /// Operation, column family and binary key in one call
    fn with_context(self, op: StorageOperation, cf: impl Into<String>, key: &[u8]) -> Result<T>;
}

impl<T> StorageResultExt<T> for Result<T> {
    fn with_operation(self, op: StorageOperation) -> Result<T> {
        self.map_err(|e| e.with_operation(op))
    }

    fn with_cf(self, cf: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_cf(cf))
    }

    fn with_context(self, op: StorageOperation, cf: impl Into<String>, key: &[u8]) -> Result<T> {
        self.map_err(|e| e.with_operation(op).with_cf(cf).with_key_bytes(key))
    }
}

// The merkle store traits speak MerkleError; keep the context in the message.
impl From<StorageError> for MerkleError {
    fn from(err: StorageError) -> Self {
        MerkleError::StorageError(err.to_string())
    }
}

/// Converts a storage result into a `MerkleResult`
pub trait IntoMerkleResult<T> {
    fn into_merkle_result(self) -> ancon_merkle::MerkleResult<T>;
}

impl<T> IntoMerkleResult<T> for Result<T> {
    fn into_merkle_result(self) -> ancon_merkle::MerkleResult<T> {
        self.map_err(MerkleError::from)
    }
}
