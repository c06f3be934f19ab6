//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{ClientError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with DAS_, sections split by `__`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // e.g. DAS__TERMINAL__PASSWORD, DAS__TRADING__ORDER_ROUTE
    builder = builder.add_source(
        Environment::with_prefix("DAS")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("trading.locate_routes")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    let app: AppConfig = config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    validate(&app)?;
    Ok(app)
}

/// Reject configurations the engine cannot run with
pub fn validate(config: &AppConfig) -> Result<()> {
    if config.trading.locate_routes.is_empty() {
        return Err(ClientError::Configuration(
            "trading.locate_routes must name at least one route".to_string(),
        ));
    }
    if config.terminal.buffer_size == 0 {
        return Err(ClientError::Configuration(
            "terminal.buffer_size must be positive".to_string(),
        ));
    }
    if config.trading.max_locate_cost_fraction.is_sign_negative() {
        return Err(ClientError::Configuration(
            "trading.max_locate_cost_fraction must not be negative".to_string(),
        ));
    }
    if config.trading.round_lot == 0 {
        return Err(ClientError::Configuration(
            "trading.round_lot must be positive".to_string(),
        ));
    }
    Ok(())
}
