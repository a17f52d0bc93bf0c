//! The proof service: one working tree behind one reader/writer lock.
//!
//! Reads take the read lock and run concurrently; writes take the write lock
//! and exclude everything else. The lock is taken per call, so two calls
//! never form an atomic unit. Results leave the service as [`Envelope`]s;
//! tree nodes never do.

use std::sync::Arc;

use ancon_merkle::{convert_existence_proof, create_membership_proof, MerkleError, MutableTree};
use ancon_storage::RocksDBMerkleStore;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ServiceConfig, VersionPolicy};
use crate::error::{ServiceError, ServiceResult};
use crate::types::*;

pub struct ProofService {
    tree: RwLock<MutableTree>,
    policy: VersionPolicy,
}

impl ProofService {
    pub fn new(tree: MutableTree, policy: VersionPolicy) -> Self {
        Self {
            tree: RwLock::new(tree),
            policy,
        }
    }

    /// A service over an empty in-memory tree.
    pub fn in_memory(policy: VersionPolicy) -> Self {
        Self::new(MutableTree::new(), policy)
    }

    /// Open the configured store and resume from `config.load_version`.
    pub fn open(config: &ServiceConfig) -> ServiceResult<Self> {
        let tree = match &config.db_path {
            Some(path) => {
                let store = Arc::new(RocksDBMerkleStore::open(path)?);
                MutableTree::load(store, config.load_version)?
            }
            None => {
                if config.load_version != 0 {
                    return Err(ServiceError::Config(format!(
                        "load_version {} requires a db_path",
                        config.load_version
                    )));
                }
                MutableTree::new()
            }
        };

        info!(
            db_path = ?config.db_path,
            version = tree.version(),
            size = tree.size(),
            policy = %config.version_policy,
            "Proof service started"
        );
        Ok(Self::new(tree, config.version_policy))
    }

    pub fn policy(&self) -> VersionPolicy {
        self.policy
    }

    // ============================================
    // Reads
    // ============================================

    pub fn has(&self, key: &[u8]) -> ServiceResult<Envelope> {
        let has = self.tree.read().has(key);
        Envelope::encode(&HasResponse { has })
    }

    pub fn get(&self, key: &[u8]) -> ServiceResult<Envelope> {
        let found = self.tree.read().get(key);
        let (index, value) = found.ok_or_else(|| MerkleError::key_not_found(key))?;
        Envelope::encode(&GetResponse { index, value })
    }

    pub fn get_by_index(&self, index: u64) -> ServiceResult<Envelope> {
        let (key, value) = self.tree.read().get_by_index(index)?;
        Envelope::encode(&GetByIndexResponse { key, value })
    }

    /// Value of `key` in the working tree with an ICS23 membership proof
    /// against the current `hash()`.
    pub fn get_with_proof(&self, key: &[u8]) -> ServiceResult<Envelope> {
        let (value, proof) = self.tree.read().get_with_proof(key)?;
        let membership = create_membership_proof(convert_existence_proof(&proof, key, &value)?);
        Envelope::encode(&GetWithProofResponse {
            value,
            membershipproof: membership.to_json_bytes()?,
        })
    }

    pub fn get_versioned(&self, version: i64, key: &[u8]) -> ServiceResult<Envelope> {
        let found = self.tree.read().get_versioned(version, key)?;
        let (index, value) = found.ok_or_else(|| MerkleError::key_not_found(key))?;
        Envelope::encode(&GetVersionedResponse {
            index,
            value,
            version,
        })
    }

    pub fn get_versioned_with_proof(&self, version: i64, key: &[u8]) -> ServiceResult<Envelope> {
        let (value, proof) = self.tree.read().get_versioned_with_proof(version, key)?;
        let membership = create_membership_proof(convert_existence_proof(&proof, key, &value)?);
        Envelope::encode(&GetVersionedWithProofResponse {
            value,
            membershipproof: membership.to_json_bytes()?,
            version,
        })
    }

    /// `hasVersion: true`, or `VersionNotFound`.
    pub fn has_versioned(&self, version: i64) -> ServiceResult<Envelope> {
        if !self.tree.read().version_exists(version) {
            return Err(MerkleError::VersionNotFound { version }.into());
        }
        Envelope::encode(&HasVersionedResponse { has_version: true })
    }

    /// Root hash of the working tree.
    pub fn hash(&self) -> ServiceResult<Envelope> {
        let hash = self.tree.read().hash();
        Envelope::encode(&HashResponse { hash: hash.to_vec() })
    }

    /// Latest saved version.
    pub fn version(&self) -> ServiceResult<Envelope> {
        let version = self.tree.read().version();
        Envelope::encode(&VersionResponse { version })
    }

    pub fn available_versions(&self) -> ServiceResult<Envelope> {
        let versions = self.tree.read().available_versions();
        Envelope::encode(&AvailableVersionsResponse { versions })
    }

    pub fn size(&self) -> ServiceResult<Envelope> {
        let size = self.tree.read().size();
        Envelope::encode(&SizeResponse { size })
    }

    /// Entries with keys in `[start, end)`, in key order or reversed.
    pub fn list(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        descending: bool,
    ) -> ServiceResult<Envelope> {
        let entries = self
            .tree
            .read()
            .iterate_range(start, end, !descending)
            .into_iter()
            .map(|(key, value)| Entry { key, value })
            .collect();
        Envelope::encode(&ListResponse { entries })
    }

    // ============================================
    // Writes
    // ============================================

    pub fn set(&self, key: &[u8], value: &[u8]) -> ServiceResult<Envelope> {
        let updated = {
            let mut tree = self.tree.write();
            let updated = tree.set(key, value).map_err(|e| {
                warn!(key = %hex::encode(key), error = %e, "Rejected set");
                e
            })?;
            self.auto_save(&mut tree)?;
            updated
        };
        Envelope::encode(&SetResponse { updated })
    }

    pub fn remove(&self, key: &[u8]) -> ServiceResult<Envelope> {
        let value = {
            let mut tree = self.tree.write();
            let value = tree.remove(key).map_err(|e| {
                warn!(key = %hex::encode(key), error = %e, "Rejected remove");
                e
            })?;
            if value.is_some() {
                self.auto_save(&mut tree)?;
            }
            value
        };
        Envelope::encode(&RemoveResponse {
            removed: value.is_some(),
            value,
        })
    }

    pub fn save_version(&self) -> ServiceResult<Envelope> {
        let (hash, version) = self.tree.write().save_version()?;
        Envelope::encode(&SaveVersionResponse {
            hash: hash.to_vec(),
            version,
        })
    }

    /// Discard unsaved changes.
    pub fn rollback(&self) -> ServiceResult<Envelope> {
        let version = {
            let mut tree = self.tree.write();
            tree.rollback();
            tree.version()
        };
        Envelope::encode(&RollbackResponse { version })
    }

    /// Reset the working tree to saved version `version` (0 = latest).
    /// Persisted versions above it are kept.
    pub fn load_version(&self, version: i64) -> ServiceResult<Envelope> {
        let loaded = self.tree.write().load_version(version).map_err(|e| {
            warn!(version, error = %e, "Rejected load_version");
            e
        })?;
        info!(version = loaded, "Loaded version");
        Envelope::encode(&LoadVersionResponse { version: loaded })
    }

    /// Like [`ProofService::load_version`], but also deletes every persisted
    /// version above the loaded one so later saves can replace them.
    pub fn load_version_for_overwriting(&self, version: i64) -> ServiceResult<Envelope> {
        let loaded = self
            .tree
            .write()
            .load_version_for_overwriting(version)
            .map_err(|e| {
                warn!(version, error = %e, "Rejected load_version_for_overwriting");
                e
            })?;
        info!(version = loaded, "Loaded version for overwriting");
        Envelope::encode(&LoadVersionResponse { version: loaded })
    }

    /// Under `AutoSave`, save the write that was just applied. A failed save
    /// rolls the write back so the working tree matches the latest version.
    fn auto_save(&self, tree: &mut MutableTree) -> ServiceResult<()> {
        if self.policy != VersionPolicy::AutoSave {
            return Ok(());
        }
        match tree.save_version() {
            Ok((hash, version)) => {
                debug!(version, hash = %hash, "Auto-saved version");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Auto-save failed, rolling back write");
                tree.rollback();
                Err(e.into())
            }
        }
    }
}
