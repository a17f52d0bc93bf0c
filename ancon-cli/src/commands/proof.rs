//! Proof commands

use ancon_api::{Envelope, GetWithProofResponse, ProofService};
use ancon_merkle::{verify_membership, CommitmentProof, HashValue, ProofSpec};
use anyhow::{Context, Result};
use colored::Colorize;

use super::Output;

pub fn prove(service: &ProofService, key: &[u8], version: Option<i64>) -> Result<Envelope> {
    let envelope = match version {
        Some(version) => service.get_versioned_with_proof(version, key)?,
        None => service.get_with_proof(key)?,
    };
    Ok(envelope)
}

/// Verify a `prove` envelope offline. Only the root hash is trusted.
pub fn verify(output: &Output, root: &str, key: &str, value: &str, proof: &str) -> Result<()> {
    let root = HashValue::from_hex(root)
        .context("root must be a 32-byte hex hash")?;
    let key = output.bytes(key)?;
    let value = output.bytes(value)?;

    // Both proof responses carry the same two byte fields.
    let response: GetWithProofResponse = Envelope::parse(proof)?.decode()?;
    if response.value != value {
        anyhow::bail!("{} proof is for a different value", "✗".red().bold());
    }
    let commitment = CommitmentProof::from_json_bytes(&response.membershipproof)?;

    verify_membership(&ProofSpec::iavl(), &root, &commitment, &key, &value)
        .context("proof does not verify")?;
    println!("{} proof verifies against {}", "✓".green().bold(), root.to_hex().cyan());
    Ok(())
}
