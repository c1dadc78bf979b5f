use std::{collections::HashSet, path::PathBuf};

use thiserror::Error;

use crate::types::{Address, InvalidAddress, TargetPair};

pub const TARGETS_VAR: &str = "CONF_TPL";
pub const ARTIFACTS_DIR_VAR: &str = "CONF_ARTIFACTS_DIR";
pub const NETWORK_ID_VAR: &str = "CONF_NETWORK_ID";
pub const MULTISIG_CLIENT_ADDRESS_VAR: &str = "MULTISIG_CLIENT_ADDRESS";
pub const IBC_HOST_ADDRESS_VAR: &str = "IBC_HOST_ADDRESS";

const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";
const TARGET_SEPARATOR: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("You must set environment variable '{name}'", name = TARGETS_VAR)]
    MissingTargets,

    #[error("Invalid pair found: output '{token}' has no template")]
    InvalidPair { token: String },

    #[error("Empty path at position {index} in '{name}'", name = TARGETS_VAR)]
    EmptyPath { index: usize },

    #[error("Output '{path}' is listed more than once in '{name}'", name = TARGETS_VAR)]
    DuplicateOutput { path: String },

    #[error(
        "Both '{multisig}' and '{host}' must be set to override deployment artifacts",
        multisig = MULTISIG_CLIENT_ADDRESS_VAR,
        host = IBC_HOST_ADDRESS_VAR
    )]
    PartialOverride,

    #[error("Invalid address in '{var}': {source}")]
    InvalidAddress {
        var: &'static str,
        #[source]
        source: InvalidAddress,
    },
}

/// Where the two deployment addresses come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    Artifacts {
        dir: PathBuf,
        network_id: Option<String>,
    },
    Static {
        multisig_client: Address,
        ibc_host: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub targets: Vec<TargetPair>,
    pub registry: RegistrySource,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Nothing is
    /// touched on disk; all validation happens here.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_targets = var(TARGETS_VAR)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingTargets)?;
        let targets = parse_targets(&raw_targets)?;

        let registry = registry_source(&var)?;

        Ok(Config { targets, registry })
    }
}

/// Splits `out1:tpl1:out2:tpl2:...` into target pairs, preserving order.
pub fn parse_targets(raw: &str) -> Result<Vec<TargetPair>, ConfigError> {
    let tokens: Vec<&str> = raw.split(TARGET_SEPARATOR).collect();

    if tokens.len() % 2 != 0 {
        return Err(ConfigError::InvalidPair {
            token: tokens.last().copied().unwrap_or_default().to_string(),
        });
    }

    if let Some(index) = tokens.iter().position(|token| token.is_empty()) {
        return Err(ConfigError::EmptyPath { index });
    }

    let mut seen_outputs: HashSet<&str> = HashSet::new();
    let mut targets = Vec::with_capacity(tokens.len() / 2);

    for pair in tokens.chunks_exact(2) {
        let (output, template) = (pair[0], pair[1]);

        if !seen_outputs.insert(output) {
            return Err(ConfigError::DuplicateOutput {
                path: output.to_string(),
            });
        }

        targets.push(TargetPair {
            output: PathBuf::from(output),
            template: PathBuf::from(template),
        });
    }

    Ok(targets)
}

fn registry_source<F>(var: &F) -> Result<RegistrySource, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| var(name).filter(|value| !value.is_empty());

    match (
        non_empty(MULTISIG_CLIENT_ADDRESS_VAR),
        non_empty(IBC_HOST_ADDRESS_VAR),
    ) {
        (Some(multisig_client), Some(ibc_host)) => Ok(RegistrySource::Static {
            multisig_client: parse_address(MULTISIG_CLIENT_ADDRESS_VAR, &multisig_client)?,
            ibc_host: parse_address(IBC_HOST_ADDRESS_VAR, &ibc_host)?,
        }),
        (None, None) => Ok(RegistrySource::Artifacts {
            dir: non_empty(ARTIFACTS_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR)),
            network_id: non_empty(NETWORK_ID_VAR),
        }),
        _ => Err(ConfigError::PartialOverride),
    }
}

fn parse_address(var: &'static str, value: &str) -> Result<Address, ConfigError> {
    value
        .parse()
        .map_err(|source| ConfigError::InvalidAddress { var, source })
}
