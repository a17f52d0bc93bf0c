/// Column families used by the merkle store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// node hash -> stored node
    MerkleNodes,
    /// version -> root hash
    MerkleRoots,
}

impl ColumnFamily {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MerkleNodes => "merkle_nodes",
            Self::MerkleRoots => "merkle_roots",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::MerkleNodes, Self::MerkleRoots]
    }

    pub fn descriptors() -> Vec<rocksdb::ColumnFamilyDescriptor> {
        Self::all()
            .into_iter()
            .map(|cf| {
                let mut opts = rocksdb::Options::default();
                match cf {
                    Self::MerkleNodes => {
                        opts.set_write_buffer_size(64 * 1024 * 1024);
                        opts.set_max_write_buffer_number(4);
                        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                    }
                    Self::MerkleRoots => {
                        // One small record per saved version
                        opts.set_write_buffer_size(4 * 1024 * 1024);
                        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
                    }
                }
                rocksdb::ColumnFamilyDescriptor::new(cf.name(), opts)
            })
            .collect()
    }
}

impl std::fmt::Display for ColumnFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
