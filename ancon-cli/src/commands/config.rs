//! Config command handlers

use std::path::PathBuf;

use ancon_api::{ServiceConfig, VersionPolicy};
use anyhow::Result;
use colored::Colorize;

use crate::config;
use crate::ConfigAction;

pub fn handle(action: ConfigAction, config_path: Option<&str>) -> Result<()> {
    let config_path = match config_path {
        Some(path) => PathBuf::from(path),
        None => config::default_path()?,
    };

    match action {
        ConfigAction::Init { path } => {
            let path = path.map(PathBuf::from).unwrap_or(config_path);
            let path = config::init(&path)?;
            println!(
                "{} Configuration initialized at: {}",
                "✓".green().bold(),
                path.display().to_string().cyan()
            );
            Ok(())
        }

        ConfigAction::Show => {
            if !config_path.exists() {
                println!(
                    "{} No configuration file found. Run 'ancon config init' first.",
                    "✗".red().bold()
                );
                return Ok(());
            }

            let config = ServiceConfig::load(&config_path)?;
            let db_path = config
                .db_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(in memory)".to_string());

            println!("{}", "Configuration:".bold());
            println!("  DB Path:        {}", db_path.cyan());
            println!("  Load Version:   {}", config.load_version.to_string().cyan());
            println!("  Version Policy: {}", config.version_policy.to_string().cyan());
            println!();
            println!("Config file: {}", config_path.display().to_string().dimmed());
            Ok(())
        }

        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                config::init(&config_path)?;
            }
            let mut config = ServiceConfig::load(&config_path)?;

            match key.as_str() {
                "db_path" => {
                    config.db_path = (!value.is_empty()).then(|| PathBuf::from(&value));
                }
                "load_version" => {
                    config.load_version = value.parse()?;
                }
                "version_policy" => {
                    config.version_policy = value.parse::<VersionPolicy>()?;
                }
                _ => {
                    println!("{} Unknown config key: {}", "✗".red().bold(), key.red());
                    println!("Available keys: db_path, load_version, version_policy");
                    return Ok(());
                }
            }

            config.save(&config_path)?;
            println!("{} Set {} = {}", "✓".green().bold(), key, value.cyan());
            Ok(())
        }
    }
}
