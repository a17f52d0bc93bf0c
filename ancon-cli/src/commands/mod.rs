//! Command handlers

pub mod config;
pub mod proof;
pub mod tree;

use ancon_api::Envelope;
use anyhow::{Context, Result};

/// How keys and values are read from the command line and results printed.
pub struct Output {
    pub hex: bool,
    pub json: bool,
}

impl Output {
    /// Parse a key or value argument.
    pub fn bytes(&self, arg: &str) -> Result<Vec<u8>> {
        if self.hex {
            let digits = arg.strip_prefix("0x").unwrap_or(arg);
            hex::decode(digits).with_context(|| format!("not valid hex: {}", arg))
        } else {
            Ok(arg.as_bytes().to_vec())
        }
    }

    pub fn print(&self, envelope: &Envelope) -> Result<()> {
        if self.json {
            let value: serde_json::Value = serde_json::from_slice(&envelope.json()?)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", envelope);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_modes() {
        let text = Output { hex: false, json: false };
        assert_eq!(text.bytes("ab").unwrap(), b"ab".to_vec());

        let hex = Output { hex: true, json: false };
        assert_eq!(hex.bytes("0x6162").unwrap(), b"ab".to_vec());
        assert_eq!(hex.bytes("6162").unwrap(), b"ab".to_vec());
        assert!(hex.bytes("xyz").is_err());
    }
}
