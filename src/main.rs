mod config;
mod generate;
mod registry;
mod template;
mod types;
mod write;

use std::{process::ExitCode, sync::Arc};

use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, ConfigError},
    generate::GenerateError,
    registry::{Deployments, RegistryError},
    template::EjsRenderer,
};

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Config::from_env()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Result<Config, ConfigError>) -> Result<(), Error> {
    let config = config?;

    let deployments = Deployments::resolve(registry::from_source(&config.registry).as_ref())?;

    debug!(
        multisig_client = %deployments.multisig_client,
        ibc_host = %deployments.ibc_host,
        "Resolved deployment addresses"
    );

    generate::generate(
        config.targets,
        &deployments.context(),
        Arc::new(EjsRenderer),
        |written| info!(count = written.len(), "All configuration files generated"),
    )
    .await?;

    Ok(())
}
