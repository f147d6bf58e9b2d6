//! Builds an `AppConfig` by layering the config files and the environment with `figment`.
//! Gets initialized with `OnceLock` so it only needs to get initialized once.

mod error;
mod types;

use std::sync::OnceLock;
use tracing::info;

pub use error::{ConfigError, ConfigResult};
pub use types::{
    AppConfig, DbConfig, EmailConfig, Environment, NetConfig, SslRequire, StoreBackend,
    StoreConfig,
};

/// Allocates a static `OnceLock` containing `AppConfig`.
/// This ensures configuration only gets initialized the first time we call this function.
/// Every other caller gets a &'static ref to AppConfig.
/// Panics if anything goes wrong.
pub fn get_or_init_config() -> &'static AppConfig {
    static CONFIG_INIT: OnceLock<AppConfig> = OnceLock::new();
    CONFIG_INIT.get_or_init(|| {
        info!(
            "{:<20} - Initializing the configuration",
            "get_or_init_config"
        );
        let base_path = std::env::current_dir().expect("Failed to determine the current DIR.");
        let config_dir = base_path.join("config");

        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "local".into())
            .try_into()
            .expect("Failed to parse APP_ENVIRONMENT.");

        let mut config = AppConfig::load(&config_dir, &environment)
            .unwrap_or_else(|er| panic!("Fatal Error: Building config: {er}"));

        // A DATABASE_URL provided by the platform wins in production.
        if matches!(environment, Environment::Production) {
            if let Ok(production_db) = std::env::var("DATABASE_URL") {
                let prod_db_config =
                    DbConfig::try_from(production_db.as_str()).unwrap_or_else(|er| {
                        panic!("Fatal Error: While parsing DbConfig from String: {er:?}")
                    });
                config.db_config = Some(prod_db_config);
            }
        }

        config
    })
}
