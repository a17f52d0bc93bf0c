//! RocksDB core infrastructure
//!
//! This module provides the foundational components for RocksDB storage:
//! - `AnconDB`: Main database wrapper with column family support
//! - `RocksDBConfig`: Configuration options
//! - `ColumnFamily`: Column family definitions
//! - `StorageError`: Rich error types with context

pub mod db;
pub mod error;
pub mod config;
pub mod column_family;

pub use db::AnconDB;
pub use error::{IntoMerkleResult, StorageError, StorageErrorKind, StorageOperation, StorageResultExt};
pub use config::RocksDBConfig;
pub use column_family::ColumnFamily;
