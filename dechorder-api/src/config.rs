//! Configuration resolution for dechorder-api
//!
//! Priority: command line → environment → TOML file → built-in defaults.

use dechorder_common::config::{
    default_config_path, load_toml_config, PredictionServiceKind, TomlConfig,
};
use dechorder_common::Result;
use std::path::PathBuf;
use tracing::{info, warn};

/// Values given on the command line, taking precedence over everything else
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub prediction_service: Option<PredictionServiceKind>,
    pub upload_dir: Option<PathBuf>,
}

/// Load, override and validate the service configuration
pub fn resolve_config(overrides: &CliOverrides) -> Result<TomlConfig> {
    let path = overrides
        .config_path
        .clone()
        .or_else(|| default_config_path(crate::MODULE_NAME));

    let mut config = match path {
        Some(path) => load_toml_config(&path)?,
        None => {
            warn!("No configuration directory available, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides()?;
    apply_cli_overrides(&mut config, overrides);
    config.validate()?;

    info!(
        bind_address = %config.bind_address,
        port = config.port,
        upload_dir = %config.upload_dir().display(),
        prediction_service = %config.prediction.service,
        remote = ?config.prediction.remote,
        "Configuration resolved"
    );
    Ok(config)
}

fn apply_cli_overrides(config: &mut TomlConfig, overrides: &CliOverrides) {
    if let Some(bind_address) = &overrides.bind_address {
        config.bind_address = bind_address.clone();
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(service) = overrides.prediction_service {
        config.prediction.service = service;
    }
    if let Some(upload_dir) = &overrides.upload_dir {
        config.upload_dir = Some(upload_dir.clone());
    }
}
