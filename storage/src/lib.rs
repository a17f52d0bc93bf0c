//! Persistent storage for the ancon merkle tree.
//!
//! [`RocksDBMerkleStore`] implements the node and root store traits from
//! `ancon-merkle` on top of RocksDB, with one column family for nodes keyed
//! by hash and one for per-version root records.

// RocksDB storage implementation
pub mod rocks;

pub use rocks::{AnconDB, ColumnFamily, RocksDBConfig, RocksDBMerkleStore, StorageError};
