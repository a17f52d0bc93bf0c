//! Response types and the result envelope.
//!
//! Every service call returns an [`Envelope`]: the response record as JSON,
//! hex-encoded with a `0x` prefix. Byte fields are base64 strings inside the
//! JSON.

use std::fmt;

use ancon_merkle::encoding::{base64_bytes, base64_bytes_opt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

// ============================================
// Envelope
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope(String);

impl Envelope {
    pub fn encode<T: Serialize>(response: &T) -> ServiceResult<Self> {
        let json = serde_json::to_vec(response)?;
        Ok(Self(format!("0x{}", hex::encode(json))))
    }

    /// Wrap an encoded envelope received from elsewhere.
    pub fn parse(encoded: impl Into<String>) -> ServiceResult<Self> {
        let encoded = encoded.into();
        let body = encoded
            .strip_prefix("0x")
            .ok_or_else(|| ServiceError::Encoding("envelope must start with 0x".to_string()))?;
        hex::decode(body)?;
        Ok(Self(encoded))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> ServiceResult<T> {
        let json = self.json()?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// The JSON bytes inside the envelope.
    pub fn json(&self) -> ServiceResult<Vec<u8>> {
        let body = self.0.strip_prefix("0x").unwrap_or(&self.0);
        Ok(hex::decode(body)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// Point reads
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasResponse {
    pub has: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResponse {
    /// Rank of the key in sorted order
    pub index: u64,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetByIndexResponse {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionedResponse {
    pub index: u64,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    pub version: i64,
}

// ============================================
// Proofs
// ============================================

/// `membershipproof` holds the JSON bytes of an ICS23 `CommitmentProof`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetWithProofResponse {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub membershipproof: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionedWithProofResponse {
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub membershipproof: Vec<u8>,
    pub version: i64,
}

// ============================================
// Versions and tree metadata
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasVersionedResponse {
    #[serde(rename = "hasVersion")]
    pub has_version: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResponse {
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableVersionsResponse {
    pub versions: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeResponse {
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    pub entries: Vec<Entry>,
}

// ============================================
// Writes
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {
    /// Whether an existing key was overwritten
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub removed: bool,
    /// The removed value
    #[serde(with = "base64_bytes_opt", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveVersionResponse {
    #[serde(with = "base64_bytes")]
    pub hash: Vec<u8>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadVersionResponse {
    /// The version the working tree now matches
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResponse {
    /// The version the working tree now matches
    pub version: i64,
}
