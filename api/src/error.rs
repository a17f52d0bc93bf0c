//! Service-level errors.

use ancon_merkle::MerkleError;
use ancon_storage::StorageError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rejected or failed tree operation
    #[error(transparent)]
    Tree(#[from] MerkleError),

    /// Response envelope could not be built or parsed
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Opening the backing store failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::Tree(e) if e.is_key_not_found())
    }

    pub fn is_version_not_found(&self) -> bool {
        matches!(self, Self::Tree(e) if e.is_version_not_found())
    }

    /// Either kind of missing-entity error.
    pub fn is_not_found(&self) -> bool {
        self.is_key_not_found() || self.is_version_not_found()
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::Tree(MerkleError::InvalidArgument(_)))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<hex::FromHexError> for ServiceError {
    fn from(e: hex::FromHexError) -> Self {
        Self::Encoding(e.to_string())
    }
}
