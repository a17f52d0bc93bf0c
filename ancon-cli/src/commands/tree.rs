//! Tree read and write commands

use ancon_api::{ProofService, ServiceConfig, VersionPolicy};
use anyhow::Result;
use tracing::warn;

use super::{proof, Output};
use crate::Commands;

pub fn handle(command: Commands, config: &ServiceConfig, output: &Output) -> Result<()> {
    // Each invocation is its own process, so every write becomes a version.
    let config = ServiceConfig {
        version_policy: VersionPolicy::AutoSave,
        ..config.clone()
    };
    if config.db_path.is_none() {
        warn!("No db_path configured, the tree is in memory and starts empty");
    }
    let service = ProofService::open(&config)?;

    let envelope = match command {
        Commands::Set { key, value } => service.set(&output.bytes(&key)?, &output.bytes(&value)?)?,
        Commands::Remove { key } => service.remove(&output.bytes(&key)?)?,
        Commands::Get { key, version } => match version {
            Some(version) => service.get_versioned(version, &output.bytes(&key)?)?,
            None => service.get(&output.bytes(&key)?)?,
        },
        Commands::GetByIndex { index } => service.get_by_index(index)?,
        Commands::Has { key } => service.has(&output.bytes(&key)?)?,
        Commands::Prove { key, version } => proof::prove(&service, &output.bytes(&key)?, version)?,
        Commands::Hash => service.hash()?,
        Commands::Save => service.save_version()?,
        Commands::LoadVersion { version, overwrite } => {
            if overwrite {
                service.load_version_for_overwriting(version)?
            } else {
                service.load_version(version)?
            }
        }
        Commands::Version => service.version()?,
        Commands::Versions => service.available_versions()?,
        Commands::Size => service.size()?,
        Commands::List {
            start,
            end,
            descending,
        } => {
            let start = start.map(|s| output.bytes(&s)).transpose()?;
            let end = end.map(|e| output.bytes(&e)).transpose()?;
            service.list(start.as_deref(), end.as_deref(), descending)?
        }
        Commands::Config { .. } | Commands::Verify { .. } => {
            anyhow::bail!("not a tree command")
        }
    };

    output.print(&envelope)
}
