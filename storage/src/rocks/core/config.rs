use std::path::PathBuf;

/// Configuration for RocksDB
#[derive(Debug, Clone)]
pub struct RocksDBConfig {
    /// Path to the RocksDB directory
    pub path: PathBuf,

    /// Maximum number of open files
    pub max_open_files: i32,

    /// Size of write buffer in bytes (default: 32MB)
    pub write_buffer_size: usize,

    /// Maximum number of write buffers (default: 3)
    pub max_write_buffer_number: i32,

    /// Cache size for block cache (default: 128MB)
    pub block_cache_size: usize,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ancon_db"),
            max_open_files: 1000,
            write_buffer_size: 32 * 1024 * 1024,  // 32MB
            max_write_buffer_number: 3,
            block_cache_size: 128 * 1024 * 1024,  // 128MB
            enable_statistics: false,
        }
    }
}

impl RocksDBConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create options for RocksDB from this config
    pub fn to_options(&self) -> rocksdb::Options {
        let mut opts = rocksdb::Options::default();

        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);

        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);

        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_level_compaction_dynamic_level_bytes(true);

        // Node lookups are point reads by hash
        let cache = rocksdb::Cache::new_lru_cache(self.block_cache_size);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        if self.enable_statistics {
            opts.enable_statistics();
        }

        opts
    }
}
