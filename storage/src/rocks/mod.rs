//! RocksDB storage implementation for the ancon merkle tree.

pub mod core;
pub mod merkle_store;

pub use self::core::{AnconDB, ColumnFamily, RocksDBConfig, StorageError};
pub use merkle_store::RocksDBMerkleStore;
