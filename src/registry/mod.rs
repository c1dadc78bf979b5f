use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::RegistrySource,
    types::{Address, ContractName, IBC_HOST, MULTISIG_CLIENT, TemplateContext},
};

/// A truffle build artifact, reduced to the fields needed to find a deployment.
#[derive(Debug, Deserialize)]
struct Artifact {
    #[serde(rename = "contractName")]
    contract_name: String,
    #[serde(default)]
    networks: BTreeMap<String, Network>,
    #[serde(rename = "updatedAt", default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Network {
    address: String,
    #[serde(rename = "transactionHash", default)]
    transaction_hash: Option<String>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read artifact '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse artifact '{path}': {source}")]
    SerdeError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Contract '{contract_name}' is not deployed{}", network_suffix(.network_id))]
    NotDeployed {
        contract_name: String,
        network_id: Option<String>,
    },

    #[error(
        "Contract '{contract_name}' is deployed on several networks {networks:?}; set CONF_NETWORK_ID"
    )]
    AmbiguousNetwork {
        contract_name: String,
        networks: Vec<String>,
    },

    #[error("Contract '{contract_name}' has an invalid address '{address}'")]
    InvalidAddress {
        contract_name: String,
        address: String,
    },
}

fn network_suffix(network_id: &Option<String>) -> String {
    match network_id {
        Some(id) => format!(" on network {}", id),
        None => String::new(),
    }
}

/// Resolves contract names to their deployed addresses.
pub trait DeploymentRegistry {
    fn address_of(&self, contract_name: &str) -> Result<Address, RegistryError>;
}

/// Reads `<dir>/<ContractName>.json` artifacts as written by `truffle migrate`.
#[derive(Debug, Clone)]
pub struct TruffleArtifacts {
    dir: PathBuf,
    network_id: Option<String>,
}

impl TruffleArtifacts {
    pub fn new(dir: impl Into<PathBuf>, network_id: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            network_id,
        }
    }

    fn artifact_path(&self, contract_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", contract_name))
    }
}

fn read_artifact(path: &Path) -> Result<Artifact, RegistryError> {
    let file = File::open(path).map_err(|source| RegistryError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| RegistryError::SerdeError {
        path: path.to_path_buf(),
        source,
    })
}

fn select_network<'a>(
    artifact: &'a Artifact,
    network_id: Option<&str>,
) -> Result<(&'a str, &'a Network), RegistryError> {
    if let Some(id) = network_id {
        return artifact
            .networks
            .get_key_value(id)
            .map(|(id, network)| (id.as_str(), network))
            .ok_or_else(|| RegistryError::NotDeployed {
                contract_name: artifact.contract_name.clone(),
                network_id: Some(id.to_string()),
            });
    }

    let mut networks = artifact.networks.iter();
    match (networks.next(), networks.next()) {
        (Some((id, network)), None) => Ok((id.as_str(), network)),
        (None, _) => Err(RegistryError::NotDeployed {
            contract_name: artifact.contract_name.clone(),
            network_id: None,
        }),
        (Some(_), Some(_)) => Err(RegistryError::AmbiguousNetwork {
            contract_name: artifact.contract_name.clone(),
            networks: artifact.networks.keys().cloned().collect(),
        }),
    }
}

impl DeploymentRegistry for TruffleArtifacts {
    fn address_of(&self, contract_name: &str) -> Result<Address, RegistryError> {
        let artifact = read_artifact(&self.artifact_path(contract_name))?;
        let (network_id, network) = select_network(&artifact, self.network_id.as_deref())?;

        let address: Address = network
            .address
            .parse()
            .map_err(|_| RegistryError::InvalidAddress {
                contract_name: artifact.contract_name.clone(),
                address: network.address.clone(),
            })?;

        debug!(
            contract = %artifact.contract_name,
            network_id = %network_id,
            address = %network.address,
            transaction_hash = network.transaction_hash.as_deref().unwrap_or("-"),
            updated_at = ?artifact.updated_at.map(|at| at.to_rfc3339()),
            "Resolved deployment from artifact"
        );

        Ok(address)
    }
}

/// A fixed set of addresses, used when deployments are supplied directly.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    addresses: HashMap<String, Address>,
}

impl StaticRegistry {
    pub fn with(mut self, contract_name: &str, address: Address) -> Self {
        self.addresses.insert(contract_name.to_string(), address);
        self
    }
}

impl DeploymentRegistry for StaticRegistry {
    fn address_of(&self, contract_name: &str) -> Result<Address, RegistryError> {
        self.addresses
            .get(contract_name)
            .cloned()
            .ok_or_else(|| RegistryError::NotDeployed {
                contract_name: contract_name.to_string(),
                network_id: None,
            })
    }
}

/// Builds the registry named by the configuration.
pub fn from_source(source: &RegistrySource) -> Box<dyn DeploymentRegistry> {
    match source {
        RegistrySource::Artifacts { dir, network_id } => {
            Box::new(TruffleArtifacts::new(dir.clone(), network_id.clone()))
        }
        RegistrySource::Static {
            multisig_client,
            ibc_host,
        } => Box::new(
            StaticRegistry::default()
                .with(MULTISIG_CLIENT, multisig_client.clone())
                .with(IBC_HOST, ibc_host.clone()),
        ),
    }
}

/// The two addresses every template is rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployments {
    pub multisig_client: Address,
    pub ibc_host: Address,
}

impl Deployments {
    pub fn resolve(registry: &dyn DeploymentRegistry) -> Result<Self, RegistryError> {
        let lookup = |name: ContractName| registry.address_of(name);

        Ok(Deployments {
            multisig_client: lookup(MULTISIG_CLIENT)?,
            ibc_host: lookup(IBC_HOST)?,
        })
    }

    pub fn context(&self) -> TemplateContext {
        TemplateContext::new(self.multisig_client.as_str(), self.ibc_host.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MULTISIG: &str = "0x361552A65C96621003C62C5971b910a1fdC9ba78";
    const HOST: &str = "0x9eBF3956EE45B2b9F1fC85FB8990ce6be52F47a6";

    fn write_artifact(dir: &Path, contract_name: &str, networks: serde_json::Value) {
        let artifact = serde_json::json!({
            "contractName": contract_name,
            "abi": [],
            "networks": networks,
            "updatedAt": "2021-03-04T05:06:07.890Z",
        });
        fs::write(
            dir.join(format!("{}.json", contract_name)),
            serde_json::to_string_pretty(&artifact).unwrap(),
        )
        .unwrap();
    }

    fn deployed(address: &str) -> serde_json::Value {
        serde_json::json!({
            "events": {},
            "links": {},
            "address": address,
            "transactionHash": "0xabc",
        })
    }

    #[test]
    fn test_resolve_single_network() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "MultisigClient", serde_json::json!({ "2018": deployed(MULTISIG) }));
        write_artifact(dir.path(), "IBCHost", serde_json::json!({ "2018": deployed(HOST) }));

        let registry = TruffleArtifacts::new(dir.path(), None);
        let deployments = Deployments::resolve(&registry).unwrap();

        assert_eq!(deployments.multisig_client.as_str(), MULTISIG);
        assert_eq!(deployments.ibc_host.as_str(), HOST);
        assert_eq!(deployments.context(), TemplateContext::new(MULTISIG, HOST));
    }

    #[test]
    fn test_resolve_selects_configured_network() {
        let dir = tempfile::tempdir().unwrap();
        let other = "0x0000000000000000000000000000000000000001";
        write_artifact(
            dir.path(),
            "MultisigClient",
            serde_json::json!({ "1": deployed(other), "2018": deployed(MULTISIG) }),
        );

        let registry = TruffleArtifacts::new(dir.path(), Some("2018".to_string()));
        let address = registry.address_of("MultisigClient").unwrap();
        assert_eq!(address.as_str(), MULTISIG);
    }

    #[test]
    fn test_resolve_ambiguous_network() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(
            dir.path(),
            "MultisigClient",
            serde_json::json!({ "2018": deployed(MULTISIG), "1": deployed(MULTISIG) }),
        );

        let registry = TruffleArtifacts::new(dir.path(), None);
        match registry.address_of("MultisigClient") {
            Err(RegistryError::AmbiguousNetwork { networks, .. }) => {
                assert_eq!(networks, vec!["1".to_string(), "2018".to_string()]);
            }
            other => panic!("Expected AmbiguousNetwork, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_configured_network() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "IBCHost", serde_json::json!({ "1": deployed(HOST) }));

        let registry = TruffleArtifacts::new(dir.path(), Some("2018".to_string()));
        match registry.address_of("IBCHost") {
            Err(RegistryError::NotDeployed { network_id, .. }) => {
                assert_eq!(network_id.as_deref(), Some("2018"));
            }
            other => panic!("Expected NotDeployed, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_not_migrated() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "IBCHost", serde_json::json!({}));

        let registry = TruffleArtifacts::new(dir.path(), None);
        let result = registry.address_of("IBCHost");
        assert!(matches!(result, Err(RegistryError::NotDeployed { .. })));
    }

    #[test]
    fn test_resolve_invalid_address() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "IBCHost", serde_json::json!({ "1": deployed("0xBBB") }));

        let registry = TruffleArtifacts::new(dir.path(), None);
        let result = registry.address_of("IBCHost");
        assert!(matches!(result, Err(RegistryError::InvalidAddress { .. })));
    }

    #[test]
    fn test_resolve_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();

        let registry = TruffleArtifacts::new(dir.path(), None);
        let result = registry.address_of("MultisigClient");
        assert!(matches!(result, Err(RegistryError::IoError { .. })));
    }

    #[test]
    fn test_resolve_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("MultisigClient.json"), "{ not json").unwrap();

        let registry = TruffleArtifacts::new(dir.path(), None);
        let result = registry.address_of("MultisigClient");
        assert!(matches!(result, Err(RegistryError::SerdeError { .. })));
    }

    #[test]
    fn test_static_registry_from_source() {
        let source = RegistrySource::Static {
            multisig_client: MULTISIG.parse().unwrap(),
            ibc_host: HOST.parse().unwrap(),
        };

        let registry = from_source(&source);
        let deployments = Deployments::resolve(registry.as_ref()).unwrap();

        assert_eq!(deployments.multisig_client.as_str(), MULTISIG);
        assert_eq!(deployments.ibc_host.as_str(), HOST);
    }

    #[test]
    fn test_static_registry_unknown_contract() {
        let registry = StaticRegistry::default();
        let result = registry.address_of("IBCHost");
        assert!(matches!(result, Err(RegistryError::NotDeployed { .. })));
    }
}
