use std::path::{Path, PathBuf};
use std::sync::Arc;

use bincode::Encode;
use rocksdb::{WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::error::Result;
use super::{ColumnFamily, RocksDBConfig, StorageError};

/// Keys go through bincode, values through BCS. Raw keys bypass the key
/// codec for records that must sort by their byte layout.
struct Codec;

impl Codec {
    fn key<K: Encode>(key: &K) -> Result<Vec<u8>> {
        bincode::encode_to_vec(key, bincode::config::standard())
            .map_err(|e| StorageError::serialization(e.to_string()))
    }

    fn value<V: Serialize>(value: &V) -> Result<Vec<u8>> {
        bcs::to_bytes(value).map_err(|e| StorageError::serialization(e.to_string()))
    }

    fn decode<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
        bcs::from_bytes(bytes).map_err(|e| StorageError::deserialization(e.to_string()))
    }
}

/// Shared handle to the merkle database
#[derive(Clone)]
pub struct AnconDB {
    db: Arc<DB>,
    path: PathBuf,
}

impl AnconDB {
    /// Open or create the database, creating missing column families
    pub fn open(config: RocksDBConfig) -> Result<Self> {
        let db = DB::open_cf_descriptors(
            &config.to_options(),
            &config.path,
            ColumnFamily::descriptors(),
        )?;
        info!(path = %config.path.display(), "Opened RocksDB");

        Ok(Self {
            db: Arc::new(db),
            path: config.path,
        })
    }

    pub fn open_default(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(RocksDBConfig::new(path.as_ref()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handle(&self, cf: ColumnFamily) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(cf.name())
            .ok_or_else(|| StorageError::cf_not_found(cf.name()))
    }

    fn read(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.handle(cf)?, key)?)
    }

    fn write(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.put_cf(self.handle(cf)?, key, value)?;
        Ok(())
    }

    // ========== Encoded keys ==========

    pub fn put<K: Encode, V: Serialize>(&self, cf: ColumnFamily, key: &K, value: &V) -> Result<()> {
        self.write(cf, &Codec::key(key)?, &Codec::value(value)?)
    }

    pub fn get<K: Encode, V: DeserializeOwned>(&self, cf: ColumnFamily, key: &K) -> Result<Option<V>> {
        self.read(cf, &Codec::key(key)?)?
            .map(|bytes| Codec::decode(&bytes))
            .transpose()
    }

    pub fn exists<K: Encode>(&self, cf: ColumnFamily, key: &K) -> Result<bool> {
        let key = Codec::key(key)?;
        let handle = self.handle(cf)?;
        // The bloom filter answers most misses without a read.
        if !self.db.key_may_exist_cf(handle, &key) {
            return Ok(false);
        }
        Ok(self.db.get_pinned_cf(handle, &key)?.is_some())
    }

    // ========== Raw keys ==========

    pub fn put_raw<V: Serialize>(&self, cf: ColumnFamily, key: &[u8], value: &V) -> Result<()> {
        self.write(cf, key, &Codec::value(value)?)
    }

    pub fn get_raw<V: DeserializeOwned>(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<V>> {
        self.read(cf, key)?.map(|bytes| Codec::decode(&bytes)).transpose()
    }

    /// Raw keys starting with `prefix`, in key order
    pub fn prefix_scan_keys(&self, cf: ColumnFamily, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let handle = self.handle(cf)?;

        // Without a prefix extractor the iterator runs past the prefix.
        let mut keys = Vec::new();
        for item in self.db.prefix_iterator_cf(handle, prefix) {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    // ========== Batches ==========

    pub fn batch(&self) -> WriteBatch {
        WriteBatch::default()
    }

    pub fn batch_put<K: Encode, V: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: ColumnFamily,
        key: &K,
        value: &V,
    ) -> Result<()> {
        batch.put_cf(self.handle(cf)?, Codec::key(key)?, Codec::value(value)?);
        Ok(())
    }

    pub fn batch_delete_raw(&self, batch: &mut WriteBatch, cf: ColumnFamily, key: &[u8]) -> Result<()> {
        batch.delete_cf(self.handle(cf)?, key);
        Ok(())
    }

    /// Apply every write in `batch` or none of them
    pub fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        let writes = batch.len();
        self.db.write(batch)?;
        debug!(writes, "Applied write batch");
        Ok(())
    }

    /// Flush memtables of every column family to disk
    pub fn flush(&self) -> Result<()> {
        for cf in ColumnFamily::all() {
            self.db.flush_cf(self.handle(cf)?)?;
        }
        Ok(())
    }
}
