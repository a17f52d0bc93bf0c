//! Proof service API
//!
//! [`ProofService`] exposes point reads, proof reads and writes over a single
//! versioned merkle tree, guarded by one reader/writer lock. Each call
//! returns an [`Envelope`] carrying a typed response record.

pub mod config;
pub mod error;
pub mod service;
pub mod types;

pub use config::{ServiceConfig, VersionPolicy};
pub use error::{ServiceError, ServiceResult};
pub use service::ProofService;
pub use types::*;
