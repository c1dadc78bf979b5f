use std::{fmt, path::PathBuf, str::FromStr};

use serde::Serialize;
use thiserror::Error;

pub type ContractName = &'static str;

pub const MULTISIG_CLIENT: ContractName = "MultisigClient";
pub const IBC_HOST: ContractName = "IBCHost";

const ADDRESS_HEX_LEN: usize = 40;

/// An on-chain contract address, kept in the spelling it was recorded with so
/// checksum casing survives into rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid address '{0}': expected 0x followed by 40 hex digits")]
pub struct InvalidAddress(pub String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| InvalidAddress(s.to_string()))?;

        if digits.len() != ADDRESS_HEX_LEN || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidAddress(s.to_string()));
        }

        Ok(Address(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work: render `template` and write the result to `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPair {
    pub output: PathBuf,
    pub template: PathBuf,
}

/// The names exposed to every template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateContext {
    #[serde(rename = "MultisigClientAddress")]
    pub multisig_client_address: String,
    #[serde(rename = "IBCHostAddress")]
    pub ibc_host_address: String,
}

impl TemplateContext {
    pub fn new(multisig_client_address: impl Into<String>, ibc_host_address: impl Into<String>) -> Self {
        Self {
            multisig_client_address: multisig_client_address.into(),
            ibc_host_address: ibc_host_address.into(),
        }
    }

    pub fn to_map(&self) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "template context serialized to non-object: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: &str = "0x361552A65C96621003C62C5971b910a1fdC9ba78";

    #[test]
    fn test_address_keeps_checksum_case() {
        let address: Address = CHECKSUMMED.parse().unwrap();
        assert_eq!(address.to_string(), CHECKSUMMED);
    }

    #[test]
    fn test_address_rejects_missing_prefix() {
        let result = "361552A65C96621003C62C5971b910a1fdC9ba78".parse::<Address>();
        assert!(result.is_err());
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!("0xAAA".parse::<Address>().is_err());
        assert!(format!("{}00", CHECKSUMMED).parse::<Address>().is_err());
    }

    #[test]
    fn test_address_rejects_non_hex() {
        let result = "0x361552A65C96621003C62C5971b910a1fdC9baZZ".parse::<Address>();
        assert_eq!(
            result,
            Err(InvalidAddress(
                "0x361552A65C96621003C62C5971b910a1fdC9baZZ".to_string()
            ))
        );
    }

    #[test]
    fn test_template_context_exposes_exactly_two_names() {
        let context = TemplateContext::new("0xAAA", "0xBBB");
        let map = context.to_map().unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("MultisigClientAddress"), Some(&"0xAAA".into()));
        assert_eq!(map.get("IBCHostAddress"), Some(&"0xBBB".into()));
    }
}
